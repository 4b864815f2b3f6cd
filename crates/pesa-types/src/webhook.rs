//! Inbound provider callbacks and the contract for interpreting them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ids::{PaymentId, WebhookId};
use crate::payment::{Status, StatusUpdate};
use crate::short_code::Service;

/// A stored webhook delivery.
///
/// `data` holds the decoded payload once a processor has run. `outcome` records
/// what reconciliation did with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    pub id: WebhookId,
    pub service: Service,
    pub action: String,
    #[serde(with = "crate::util::b64")]
    pub body: Vec<u8>,
    pub data: Option<serde_json::Value>,
    pub outcome: Option<WebhookOutcome>,
    pub received_at: DateTime<Utc>,
}

impl WebhookResult {
    pub fn new(service: Service, action: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: WebhookId::new(),
            service,
            action: action.into(),
            body: body.into(),
            data: None,
            outcome: None,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied {
        payment_id: PaymentId,
        status: Status,
    },
    /// The payment was already terminal; the update was dropped.
    Stale {
        payment_id: PaymentId,
        status: Status,
    },
    /// The callback does not concern a payment.
    Ignored,
    Failed {
        kind: ErrorKind,
        reason: String,
    },
}

/// Transaction facts a processor extracted from a callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub amount: Option<String>,
    pub receipt: Option<String>,
    pub phone: Option<String>,
    pub transaction_time: Option<String>,
}

/// Result of interpreting one callback that concerns a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Correlation id to match against [`Request::external_id`](crate::request::Request::external_id).
    pub correlation_id: String,
    pub update: StatusUpdate,
    pub details: TransactionDetails,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("unknown {service} webhook action `{action}`")]
    UnknownAction { service: Service, action: String },
    #[error("{service} `{action}` webhooks are not supported")]
    Unsupported { service: Service, action: String },
    #[error("failed to decode `{action}` webhook: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{action}` webhook carries no correlation id")]
    MissingCorrelation { action: String },
}

impl WebhookError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::UnknownAction { .. } | WebhookError::Unsupported { .. } => {
                ErrorKind::Unsupported
            }
            WebhookError::Decode { .. } | WebhookError::MissingCorrelation { .. } => {
                ErrorKind::DecodeError
            }
        }
    }
}

/// Interprets one provider's callbacks.
///
/// Dispatch is keyed by the action segment of the callback URL. A processor
/// stores the decoded payload in `webhook.data` and returns `Ok(None)` for
/// callbacks that do not concern a payment.
pub trait WebhookProcessor: Send + Sync {
    fn service(&self) -> Service;

    fn process(&self, webhook: &mut WebhookResult) -> Result<Option<Reconciliation>, WebhookError>;
}
