use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::enums::{OrderStatus, PaymentStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub order_id: Uuid,
    pub token: String,
    pub redirect_url: String,
    pub client_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResult {
    pub order_id: Uuid,
    pub transaction_status: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    /// Whether the report changed the stored order.
    pub applied: bool,
}
