use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Product,
    validation,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub old_price: Option<i64>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
    pub category_id: Uuid,
    pub stock: i32,
    pub featured: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_best_seller: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<Value>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::length_between("Product name", &self.name, 3, 100)?;
        validation::non_negative("Price", self.price)?;
        if let Some(old_price) = self.old_price {
            validation::non_negative("Old price", old_price)?;
        }
        validation::non_negative("Stock", i64::from(self.stock))?;
        if let Some(brand) = self.brand.as_deref() {
            validation::length_between("Brand", brand, 2, 50)?;
        }
        check_specifications(self.specifications.as_ref())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    /// `null` removes the old price.
    #[serde(default, deserialize_with = "super::double_option")]
    #[schema(value_type = Option<i64>)]
    pub old_price: Option<Option<i64>>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub brand: Option<String>,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
    pub featured: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_best_seller: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<Value>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = self.name.as_deref() {
            validation::length_between("Product name", name, 3, 100)?;
        }
        if let Some(price) = self.price {
            validation::non_negative("Price", price)?;
        }
        if let Some(Some(old_price)) = self.old_price {
            validation::non_negative("Old price", old_price)?;
        }
        if let Some(stock) = self.stock {
            validation::non_negative("Stock", i64::from(stock))?;
        }
        check_specifications(self.specifications.as_ref())
    }
}

fn check_specifications(value: Option<&Value>) -> AppResult<()> {
    match value {
        Some(v) if !v.is_object() => Err(AppError::BadRequest(
            "Specifications must be an object".into(),
        )),
        _ => Ok(()),
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}
