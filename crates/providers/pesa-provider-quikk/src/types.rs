//! Quikk JSON:API request and response bodies.

use chrono::{DateTime, Utc};
use http::StatusCode;
use pesa_transport::ProviderResponse;
use pesa_types::error::CallError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const TYPE_CHARGE: &str = "charge";
pub const TYPE_PAYOUT: &str = "payout";
pub const TYPE_TRANSFER: &str = "transfer";
pub const TYPE_SEARCH: &str = "search";

pub const CUSTOMER_TYPE_MSISDN: &str = "msisdn";
pub const RECIPIENT_TYPE_SHORT_CODE: &str = "short_code";

/// `{"data": {"id", "type", "attributes"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<A> {
    pub data: Resource<A>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<A> {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub attributes: A,
}

impl<A> Envelope<A> {
    /// Wraps `attributes` in a resource with a fresh id.
    pub fn new(kind: &str, attributes: A) -> Self {
        Self {
            data: Resource {
                id: Uuid::new_v4().to_string(),
                kind: kind.to_string(),
                attributes,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeAttributes {
    pub amount: u64,
    pub customer_no: String,
    pub reference: String,
    pub customer_type: &'static str,
    pub short_code: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutAttributes {
    pub amount: u64,
    pub recipient_no: String,
    pub recipient_type: &'static str,
    pub short_code: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferAttributes {
    pub amount: u64,
    pub recipient_no: String,
    pub recipient_type: &'static str,
    pub account_no: String,
    pub short_code: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSearchAttributes {
    pub short_code: String,
    pub q: String,
    /// Field `q` is matched against: `charge_id` or `response_id`.
    pub on: &'static str,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceSearchAttributes {
    pub short_code: String,
    pub posted_at: DateTime<Utc>,
}

/// Synchronous acknowledgement. `data.id` is what the callback refers back to.
#[derive(Debug, Clone, Deserialize)]
pub struct Acknowledgement {
    pub data: Resource<Value>,
}

impl ProviderResponse for Acknowledgement {
    fn external_id(&self) -> Option<&str> {
        Some(self.data.id.as_str()).filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

/// Reads a JSON:API `errors` array into a provider rejection.
pub fn decode_error(status: StatusCode, body: &[u8]) -> Option<CallError> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    let first = body.errors.into_iter().next()?;
    Some(CallError::Provider {
        status: status.as_u16(),
        code: first.title,
        message: first.detail,
    })
}
