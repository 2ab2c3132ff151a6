//! Payment gateway seam.
//!
//! The gateway is an opaque external service with three operations: begin a
//! transaction for an order, verify an asynchronous notification, and query a
//! transaction's status. Everything the rest of the crate needs from a gateway
//! goes through [`PaymentGateway`]; [`reconcile`] turns the reports it returns
//! into internal order/payment status changes.

pub mod midtrans;
pub mod reconcile;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entity::{order_items, orders, users},
    error::AppResult,
};

pub use midtrans::MidtransGateway;

/// Gateway item names are capped at 50 characters.
const MAX_ITEM_NAME: usize = 50;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Begin a transaction and return the client-facing token/redirect.
    async fn create_transaction(&self, request: &TransactionRequest) -> AppResult<PaymentIntent>;

    /// Resolve a posted notification into an authoritative status report.
    async fn verify_notification(&self, notification: &Notification) -> AppResult<StatusReport>;

    /// Query the gateway for the current state of an order's transaction.
    async fn transaction_status(&self, order_id: &str) -> AppResult<StatusReport>;
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PaymentIntent {
    pub token: String,
    pub redirect_url: String,
}

/// Body the gateway posts to the webhook. Only identifiers are trusted;
/// the status itself is re-fetched from the gateway.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Notification {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub fraud_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub gross_amount: Option<String>,
    /// Gateway-side time of the event the report describes.
    pub event_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetail>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub billing_address: GatewayAddress,
    pub shipping_address: GatewayAddress,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct GatewayAddress {
    pub first_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i32,
    pub name: String,
}

impl TransactionRequest {
    /// Build the gateway request from an order's frozen snapshot. A shipping
    /// line is appended so that the item lines add up to the gross amount.
    pub fn for_order(
        order: &orders::Model,
        items: &[order_items::Model],
        customer: &users::Model,
    ) -> Self {
        let address = GatewayAddress::from_snapshot(&order.shipping_address);

        let mut item_details: Vec<ItemDetail> = items
            .iter()
            .map(|item| ItemDetail {
                id: item.product_id.to_string(),
                price: item.price,
                quantity: item.quantity,
                name: truncate_name(&item.product_name),
            })
            .collect();

        if order.shipping > 0 {
            item_details.push(ItemDetail {
                id: "SHIPPING".into(),
                price: order.shipping,
                quantity: 1,
                name: "Shipping fee".into(),
            });
        }

        Self {
            transaction_details: TransactionDetails {
                order_id: order.id.to_string(),
                gross_amount: order.total,
            },
            customer_details: CustomerDetails {
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
                billing_address: address.clone(),
                shipping_address: address,
            },
            item_details,
        }
    }

    pub fn items_total(&self) -> i64 {
        self.item_details
            .iter()
            .map(|item| item.price * i64::from(item.quantity))
            .sum()
    }
}

impl GatewayAddress {
    fn from_snapshot(snapshot: &serde_json::Value) -> Self {
        let field = |key: &str| {
            snapshot
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            first_name: field("name"),
            address: field("address"),
            city: field("city"),
            postal_code: field("zip_code"),
        }
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_ITEM_NAME).collect()
}
