//! Daraja callback payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `ResultCode` arrives as a number from some products and a string from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultCode(pub String);

impl ResultCode {
    pub fn is_success(&self) -> bool {
        self.0.trim() == "0"
    }
}

impl<'de> Deserialize<'de> for ResultCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(ResultCode(n.to_string())),
            Value::String(s) => Ok(ResultCode(s)),
            other => Err(serde::de::Error::custom(format!(
                "ResultCode must be a number or string, got {other}"
            ))),
        }
    }
}

/// `POST <callback>/express`: STK push result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    pub result_code: ResultCode,
    #[serde(default)]
    pub result_desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default, deserialize_with = "one_or_many")]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

/// Result callback shared by B2C, B2B, transaction status, balance and reversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "Result")]
    pub result: AsyncResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AsyncResult {
    #[serde(default)]
    pub result_type: Value,
    pub result_code: ResultCode,
    #[serde(default)]
    pub result_desc: String,
    #[serde(rename = "OriginatorConversationID", default)]
    pub originator_conversation_id: String,
    #[serde(rename = "ConversationID", default)]
    pub conversation_id: String,
    #[serde(rename = "TransactionID", default)]
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_parameters: Option<ResultParameters>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultParameters {
    #[serde(rename = "ResultParameter", default, deserialize_with = "one_or_many")]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

/// Single-element lists are sometimes sent as a bare object.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
