use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{CreatePaymentRequest, PaymentIntentResponse, ReconcileResult},
    error::AppResult,
    middleware::auth::AuthUser,
    payment::Notification,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_payment))
        .route("/webhook", post(webhook))
        .route("/{order_id}/status", get(payment_status))
}

#[utoipa::path(
    post,
    path = "/api/payments/create",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Gateway token and redirect", body = ApiResponse<PaymentIntentResponse>),
        (status = 403, description = "Not your order"),
        (status = 409, description = "Order already paid or cancelled"),
        (status = 502, description = "Gateway failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentIntentResponse>>> {
    Ok(Json(
        payment_service::create_payment(&state, &user, payload).await?,
    ))
}

/// Gateway callback. Unauthenticated; the reported status is re-fetched from
/// the gateway before anything is applied.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = Notification,
    responses(
        (status = 200, description = "Notification reconciled", body = ApiResponse<ReconcileResult>),
        (status = 404, description = "Unknown order"),
        (status = 502, description = "Gateway failure")
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(notification): Json<Notification>,
) -> AppResult<Json<ApiResponse<ReconcileResult>>> {
    Ok(Json(
        payment_service::handle_notification(&state, notification).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/payments/{order_id}/status",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Gateway status reconciled into the order", body = ApiResponse<ReconcileResult>),
        (status = 403, description = "Not your order"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Gateway failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReconcileResult>>> {
    Ok(Json(
        payment_service::check_status(&state, &user, order_id).await?,
    ))
}
