//! Quikk callback payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"data": {...}, "meta": {"status", "code", "detail"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    pub data: CallbackResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResource {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: CallbackAttributes,
}

/// Union of the attributes the callback kinds carry. Which ones are present
/// depends on the action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// `payin` or `payout` on transaction searches; absent on balance searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub amount: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_created_at: Option<String>,
    /// Balance search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub detail: String,
}

impl Meta {
    pub fn is_failure(&self) -> bool {
        self.status == "FAIL"
    }
}
