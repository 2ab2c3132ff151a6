//! Mapping from gateway-reported transaction state onto the two internal
//! status axes, plus the guards applied before a mapping touches an order.
//!
//! Both the webhook and the on-demand status poll go through this module so
//! the two paths cannot diverge.

use chrono::NaiveDateTime;

use crate::entity::enums::{OrderStatus, PaymentStatus};

/// Status changes implied by a gateway report. `None` leaves the axis alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub payment_status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
}

/// Map a (transaction status, fraud status) pair onto internal statuses.
pub fn reconcile(transaction_status: &str, fraud_status: Option<&str>) -> Reconciliation {
    let (payment_status, order_status) = match (transaction_status, fraud_status) {
        ("capture", Some("challenge")) => (Some(PaymentStatus::Pending), None),
        ("capture", Some("accept")) => (Some(PaymentStatus::Paid), Some(OrderStatus::Processing)),
        ("settlement", _) => (Some(PaymentStatus::Paid), Some(OrderStatus::Processing)),
        ("cancel" | "deny" | "expire", _) => {
            (Some(PaymentStatus::Failed), Some(OrderStatus::Cancelled))
        }
        ("pending", _) => (Some(PaymentStatus::Pending), None),
        _ => (None, None),
    };
    Reconciliation {
        payment_status,
        order_status,
    }
}

/// Outcome of applying a [`Reconciliation`] to an order's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    /// The order moves PROCESSING -> CANCELLED and its stock must come back.
    pub restock: bool,
    /// Money arrived for an order that is already cancelled.
    pub refund_required: bool,
    /// Some part of the mapping was refused by a transition rule.
    pub partially_ignored: bool,
}

impl ReconcilePlan {
    pub fn changes(&self, payment: PaymentStatus, status: OrderStatus) -> bool {
        self.payment_status != payment || self.order_status != status
    }
}

pub fn plan(
    current_payment: PaymentStatus,
    current_status: OrderStatus,
    mapping: Reconciliation,
) -> ReconcilePlan {
    let mut partially_ignored = false;

    let payment_status = match mapping.payment_status {
        Some(next) if current_payment.can_transition_to(next) => next,
        Some(_) => {
            partially_ignored = true;
            current_payment
        }
        None => current_payment,
    };

    let order_status = match mapping.order_status {
        Some(next) if current_status.can_transition_to(next) => next,
        Some(_) => {
            partially_ignored = true;
            current_status
        }
        None => current_status,
    };

    ReconcilePlan {
        payment_status,
        order_status,
        restock: current_status == OrderStatus::Processing
            && order_status == OrderStatus::Cancelled,
        refund_required: order_status == OrderStatus::Cancelled
            && payment_status == PaymentStatus::Paid
            && current_payment != PaymentStatus::Paid,
        partially_ignored,
    }
}

/// A report is stale when it describes an event older than the last one applied.
pub fn is_stale(last_applied: Option<NaiveDateTime>, reported: Option<NaiveDateTime>) -> bool {
    match (last_applied, reported) {
        (Some(last), Some(reported)) => reported < last,
        _ => false,
    }
}

/// Compare the gateway's decimal gross amount ("210.00") to an order total.
pub fn amount_matches(gross_amount: &str, total: i64) -> bool {
    let trimmed = gross_amount.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if !fraction.chars().all(|c| c == '0') {
        return false;
    }
    whole.parse::<i64>().map(|v| v == total).unwrap_or(false)
}
