use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Order, OrderItem},
    payment::PaymentIntent,
    validation,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub shipping_address_id: Uuid,
    pub payment_method: String,
    /// Falls back to the configured default fee.
    pub shipping_fee: Option<i64>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::required("Payment method", &self.payment_method)?;
        validation::length_between("Payment method", &self.payment_method, 1, 50)?;
        if let Some(fee) = self.shipping_fee {
            validation::non_negative("Shipping fee", fee)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Absent when the gateway could not be reached; retry via `/payments/create`.
    pub payment: Option<PaymentIntent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
