use pesa_types::error::{CallError, ErrorKind, StoreError};
use pesa_types::ids::PaymentId;
use pesa_types::payment::{InvalidRequest, PaymentType, Status};
use pesa_types::provider::BlueprintError;
use pesa_types::short_code::Service;
use pesa_types::webhook::WebhookError;

/// Errors surfaced by the orchestrator and the reconciler.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid payment request: {0}")]
    Invalid(#[from] InvalidRequest),
    #[error("no short code configured for {0} payments")]
    NoShortCode(PaymentType),
    #[error("no provider registered for {0}")]
    NoProvider(Service),
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error("payment {payment_id} is {status} and cannot be retried")]
    NotRetryable { payment_id: PaymentId, status: Status },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Invalid(_) => ErrorKind::InvalidRequest,
            PaymentError::NoShortCode(_) | PaymentError::NoProvider(_) => ErrorKind::NotConfigured,
            PaymentError::Blueprint(e) => e.kind(),
            PaymentError::Store(e) => e.kind(),
            PaymentError::Call(e) => e.kind(),
            PaymentError::Webhook(e) => e.kind(),
            PaymentError::NotRetryable { .. } => ErrorKind::InvalidTransition,
        }
    }
}
