use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{Notification, PaymentGateway, PaymentIntent, StatusReport, TransactionRequest};
use crate::{
    config::MidtransConfig,
    error::{AppError, AppResult},
};

const SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const PRODUCTION_API_URL: &str = "https://api.midtrans.com";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Midtrans Snap (begin) and Core API (status) client.
#[derive(Clone)]
pub struct MidtransGateway {
    http: reqwest::Client,
    server_key: String,
    snap_url: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: String,
    status_message: Option<String>,
    order_id: Option<String>,
    transaction_id: Option<String>,
    transaction_status: Option<String>,
    fraud_status: Option<String>,
    gross_amount: Option<String>,
    transaction_time: Option<String>,
    settlement_time: Option<String>,
}

impl MidtransGateway {
    pub fn new(config: &MidtransConfig) -> anyhow::Result<Self> {
        let (snap_url, api_url) = if config.is_production {
            (PRODUCTION_SNAP_URL, PRODUCTION_API_URL)
        } else {
            (SANDBOX_SNAP_URL, SANDBOX_API_URL)
        };
        Self::with_base_urls(config, snap_url, api_url)
    }

    pub fn with_base_urls(
        config: &MidtransConfig,
        snap_url: &str,
        api_url: &str,
    ) -> anyhow::Result<Self> {
        if config.server_key.is_empty() {
            tracing::warn!("MIDTRANS_SERVER_KEY is empty; gateway calls will be rejected");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            server_key: config.server_key.clone(),
            snap_url: snap_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_transaction(&self, request: &TransactionRequest) -> AppResult<PaymentIntent> {
        let order_id = &request.transaction_details.order_id;
        tracing::debug!(order_id = %order_id, gross_amount = request.transaction_details.gross_amount, "creating gateway transaction");

        let response = self
            .http
            .post(format!("{}/snap/v1/transactions", self.snap_url))
            .basic_auth(&self.server_key, Some(""))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: SnapErrorResponse = response.json().await.unwrap_or_default();
            let message = if body.error_messages.is_empty() {
                format!("transaction request rejected with {status}")
            } else {
                body.error_messages.join("; ")
            };
            tracing::warn!(order_id = %order_id, %status, %message, "gateway rejected transaction");
            return Err(AppError::Upstream(message));
        }

        let body: SnapResponse = response.json().await?;
        Ok(PaymentIntent {
            token: body.token,
            redirect_url: body.redirect_url,
        })
    }

    async fn verify_notification(&self, notification: &Notification) -> AppResult<StatusReport> {
        let lookup = notification
            .transaction_id
            .as_deref()
            .unwrap_or(&notification.order_id);
        let report = self.transaction_status(lookup).await?;
        if report.order_id != notification.order_id {
            return Err(AppError::BadRequest(
                "Notification does not match gateway records".into(),
            ));
        }
        Ok(report)
    }

    async fn transaction_status(&self, order_id: &str) -> AppResult<StatusReport> {
        let response = self
            .http
            .get(format!("{}/v2/{}/status", self.api_url, order_id))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "status request failed with {}",
                response.status()
            )));
        }

        let body: StatusResponse = response.json().await?;
        into_report(body, order_id)
    }
}

fn into_report(body: StatusResponse, requested: &str) -> AppResult<StatusReport> {
    // The Core API answers unknown transactions with HTTP 200 and status_code "404".
    if body.status_code == "404" {
        return Err(AppError::not_found("Payment transaction"));
    }
    let transaction_status = body.transaction_status.ok_or_else(|| {
        AppError::Upstream(
            body.status_message
                .unwrap_or_else(|| format!("unexpected status code {}", body.status_code)),
        )
    })?;

    let event_time = [body.transaction_time.as_deref(), body.settlement_time.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(parse_gateway_time)
        .max();

    Ok(StatusReport {
        order_id: body.order_id.unwrap_or_else(|| requested.to_string()),
        transaction_id: body.transaction_id,
        transaction_status,
        fraud_status: body.fraud_status,
        gross_amount: body.gross_amount,
        event_time,
    })
}

/// Gateway timestamps are local wall-clock strings without an offset.
pub fn parse_gateway_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}
