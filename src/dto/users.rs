use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    entity::enums::PaymentMethodType,
    error::{AppError, AppResult},
    models::{Address, PaymentMethod},
    validation,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(first_name) = self.first_name.as_deref() {
            validation::length_between("First name", first_name, 2, 50)?;
        }
        if let Some(last_name) = self.last_name.as_deref() {
            validation::length_between("Last name", last_name, 2, 50)?;
        }
        if let Some(phone) = self.phone.as_deref() {
            validation::phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub is_default: Option<bool>,
}

impl AddressRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::length_between("Address name", &self.name, 2, 100)?;
        validation::length_between("Address", &self.address, 5, 255)?;
        validation::length_between("City", &self.city, 2, 100)?;
        validation::zip_code(&self.zip_code)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentMethodRequest {
    #[serde(rename = "type")]
    pub method_type: PaymentMethodType,
    #[schema(value_type = Object)]
    pub details: Value,
    pub is_default: Option<bool>,
}

impl PaymentMethodRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !self.details.is_object() {
            return Err(AppError::BadRequest(
                "Payment details must be an object".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressList {
    pub items: Vec<Address>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodList {
    pub items: Vec<PaymentMethod>,
}
