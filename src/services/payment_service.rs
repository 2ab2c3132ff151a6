//! Payment orchestration: begin a gateway transaction for an order and fold
//! gateway status reports back into the order. The webhook and the status
//! poll both end in [`apply_report`].

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit,
    dto::payments::{CreatePaymentRequest, PaymentIntentResponse, ReconcileResult},
    entity::{
        Orders, Users,
        enums::{OrderStatus, PaymentStatus},
        order_items, orders,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    payment::{
        Notification, PaymentIntent, StatusReport, TransactionRequest,
        reconcile::{amount_matches, is_stale, plan, reconcile},
    },
    response::{ApiResponse, Meta},
    services::{order_service, stock},
    state::AppState,
};

/// Ask the gateway for a transaction and store the token on the order.
pub async fn begin_payment(
    state: &AppState,
    order: orders::Model,
    items: &[order_items::Model],
) -> AppResult<(orders::Model, PaymentIntent)> {
    let customer = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let request = TransactionRequest::for_order(&order, items, &customer);
    let intent = state.gateway.create_transaction(&request).await?;

    let mut active: orders::ActiveModel = order.into();
    active.payment_token = Set(Some(intent.token.clone()));
    active.payment_redirect_url = Set(Some(intent.redirect_url.clone()));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    tracing::info!(order_id = %order.id, "payment transaction created");
    Ok((order, intent))
}

pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<PaymentIntentResponse>> {
    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You can only pay for your own orders".into(),
        ));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::InvalidState("Order is already paid".into()));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::InvalidState("Order is cancelled".into()));
    }

    let items = order_service::order_items(&state.orm, order.id).await?;
    let (order, intent) = begin_payment(state, order, &items).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_create",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment created",
        PaymentIntentResponse {
            order_id: order.id,
            token: intent.token,
            redirect_url: intent.redirect_url,
            client_key: state.config.midtrans.client_key.clone(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn handle_notification(
    state: &AppState,
    notification: Notification,
) -> AppResult<ApiResponse<ReconcileResult>> {
    tracing::debug!(
        order_id = %notification.order_id,
        status = notification.transaction_status.as_deref().unwrap_or("-"),
        "payment notification received"
    );
    let report = state.gateway.verify_notification(&notification).await?;
    let result = apply_report(state, &report).await?;
    Ok(ApiResponse::success("Notification processed", result, Some(Meta::empty())))
}

pub async fn check_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<ReconcileResult>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    user.ensure_owner_or_admin(order.user_id)?;

    let report = state.gateway.transaction_status(&order.id.to_string()).await?;
    let result = apply_report(state, &report).await?;
    Ok(ApiResponse::ok(result))
}

/// Reconcile one gateway report against the locked order.
pub async fn apply_report(state: &AppState, report: &StatusReport) -> AppResult<ReconcileResult> {
    let order_id = Uuid::parse_str(report.order_id.trim())
        .map_err(|_| AppError::not_found("Order"))?;

    let txn = state.orm.begin().await?;
    let order = order_service::lock_order(&txn, order_id).await?;

    let unchanged = |order: &orders::Model| ReconcileResult {
        order_id: order.id,
        transaction_status: report.transaction_status.clone(),
        payment_status: order.payment_status,
        order_status: order.status,
        applied: false,
    };

    if is_stale(order.gateway_event_at, report.event_time) {
        tracing::warn!(
            order_id = %order.id,
            status = %report.transaction_status,
            "stale gateway report ignored"
        );
        return Ok(unchanged(&order));
    }

    if let Some(gross) = report.gross_amount.as_deref() {
        if !amount_matches(gross, order.total) {
            tracing::warn!(
                order_id = %order.id,
                gross_amount = gross,
                total = order.total,
                "gateway amount does not match order total"
            );
            return Err(AppError::BadRequest(
                "Gross amount does not match order total".into(),
            ));
        }
    }

    let mapping = reconcile(
        &report.transaction_status,
        report.fraud_status.as_deref(),
    );
    let outcome = plan(order.payment_status, order.status, mapping);
    if outcome.partially_ignored {
        tracing::warn!(
            order_id = %order.id,
            status = %report.transaction_status,
            payment_status = %order.payment_status,
            order_status = %order.status,
            "gateway report conflicts with order state; keeping current values"
        );
    }

    let applied = outcome.changes(order.payment_status, order.status);
    let newer_event = match (order.gateway_event_at, report.event_time) {
        (Some(last), Some(reported)) => reported > last,
        (None, Some(_)) => true,
        _ => false,
    };
    if !applied && !newer_event {
        txn.commit().await?;
        return Ok(unchanged(&order));
    }

    if outcome.restock {
        let items = order_service::order_items(&txn, order.id).await?;
        stock::restore(&txn, &items).await?;
    }

    let became_paid =
        outcome.payment_status == PaymentStatus::Paid && order.payment_status != PaymentStatus::Paid;
    let previous = (order.payment_status, order.status);

    let mut active: orders::ActiveModel = order.into();
    active.payment_status = Set(outcome.payment_status);
    active.status = Set(outcome.order_status);
    if became_paid {
        active.paid_at = Set(Some(Utc::now().into()));
    }
    if newer_event {
        active.gateway_event_at = Set(report.event_time);
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    if outcome.refund_required {
        tracing::warn!(order_id = %order.id, "payment settled for a cancelled order; refund required");
    }
    if applied {
        tracing::info!(
            order_id = %order.id,
            status = %report.transaction_status,
            from_payment = %previous.0,
            to_payment = %order.payment_status,
            from_status = %previous.1,
            to_status = %order.status,
            "payment reconciled"
        );
        audit::record(
            &state.pool,
            None,
            "payment_reconcile",
            "orders",
            serde_json::json!({
                "order_id": order.id,
                "transaction_status": report.transaction_status,
                "payment_status": order.payment_status,
                "status": order.status,
            }),
        )
        .await;
    }

    Ok(ReconcileResult {
        order_id: order.id,
        transaction_status: report.transaction_status.clone(),
        payment_status: order.payment_status,
        order_status: order.status,
        applied,
    })
}
