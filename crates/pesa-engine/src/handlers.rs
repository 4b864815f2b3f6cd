//! HTTP endpoints of the payments gateway.
//!
//! Payment endpoints answer with the stored [`Payment`]. Webhook endpoints
//! always answer `202 Accepted`: a provider cannot act on our errors and would
//! only retry the delivery.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pesa_types::error::ErrorKind;
use pesa_types::ids::PaymentId;
use pesa_types::payment::{Payment, PaymentRequest};
use pesa_types::short_code::Service;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::Engine;
use crate::error::PaymentError;

/// Body of every non-2xx payment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Duplicate | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ClientError | ErrorKind::ProviderError => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(kind = %self.kind(), "request failed: {self}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Payment and webhook routes, to be given an [`Engine`] as state.
pub fn routes() -> Router<Arc<Engine>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/payments/charge", post(post_charge))
        .route("/payments/payout", post(post_payout))
        .route("/payments/transfer", post(post_transfer))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/retry", post(post_retry))
        .route("/webhooks/daraja/{action}", post(post_daraja_webhook))
        .route("/webhooks/quikk/mpesa/{action}", post(post_quikk_webhook))
}

#[instrument(skip_all)]
pub async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /payments/charge`: collects money from a customer (STK push).
#[instrument(skip_all)]
pub async fn post_charge(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), PaymentError> {
    let payment = engine
        .track(engine.orchestrator.charge(body, &engine.cancellation()))
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `POST /payments/payout`: pays a customer.
#[instrument(skip_all)]
pub async fn post_payout(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), PaymentError> {
    let payment = engine
        .track(engine.orchestrator.payout(body, &engine.cancellation()))
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `POST /payments/transfer`: moves money to another business short code.
#[instrument(skip_all)]
pub async fn post_transfer(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), PaymentError> {
    let payment = engine
        .track(engine.orchestrator.transfer(body, &engine.cancellation()))
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /payments/{id}`: current state, after asking the provider if still pending.
#[instrument(skip_all)]
pub async fn get_payment(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, PaymentError> {
    let payment = engine
        .track(engine.orchestrator.status(id, &engine.cancellation()))
        .await?;
    Ok(Json(payment))
}

/// `POST /payments/{id}/retry`: re-sends a payment parked in `initiation_failed`.
#[instrument(skip_all)]
pub async fn post_retry(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, PaymentError> {
    let payment = engine
        .track(engine.orchestrator.retry(id, &engine.cancellation()))
        .await?;
    Ok(Json(payment))
}

#[instrument(skip_all)]
pub async fn post_daraja_webhook(
    State(engine): State<Arc<Engine>>,
    Path(action): Path<String>,
    body: Bytes,
) -> StatusCode {
    accept(&engine, Service::Daraja, &action, body).await
}

#[instrument(skip_all)]
pub async fn post_quikk_webhook(
    State(engine): State<Arc<Engine>>,
    Path(action): Path<String>,
    body: Bytes,
) -> StatusCode {
    accept(&engine, Service::Quikk, &action, body).await
}

async fn accept(engine: &Engine, service: Service, action: &str, body: Bytes) -> StatusCode {
    match engine.reconciler.reconcile(service, action, body.to_vec()).await {
        Ok(webhook) => {
            tracing::debug!(webhook_id = %webhook.id, outcome = ?webhook.outcome, "webhook processed");
        }
        Err(e) => {
            tracing::warn!(
                %service,
                action,
                kind = %e.kind(),
                body_len = body.len(),
                "webhook not applied: {e}"
            );
        }
    }
    StatusCode::ACCEPTED
}
