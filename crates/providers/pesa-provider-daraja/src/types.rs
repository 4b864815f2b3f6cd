//! Daraja request and response bodies.

use http::StatusCode;
use pesa_transport::ProviderResponse;
use pesa_types::error::CallError;
use serde::{Deserialize, Deserializer, Serialize};

pub const TRANSACTION_TYPE_PAYBILL_ONLINE: &str = "CustomerPayBillOnline";
pub const COMMAND_BUSINESS_PAYMENT: &str = "BusinessPayment";
pub const COMMAND_BUSINESS_PAY_BILL: &str = "BusinessPayBill";
pub const COMMAND_TRANSACTION_STATUS: &str = "TransactionStatusQuery";
pub const COMMAND_ACCOUNT_BALANCE: &str = "AccountBalance";
pub const COMMAND_TRANSACTION_REVERSAL: &str = "TransactionReversal";
/// Organisation short code.
pub const IDENTIFIER_SHORT_CODE: &str = "4";
/// Organisation operator (reversal receiver).
pub const IDENTIFIER_ORGANISATION: &str = "11";

/// `GET /oauth/v1/generate` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(deserialize_with = "seconds")]
    pub expires_in: u64,
}

impl ProviderResponse for AccessToken {}

/// `expires_in` is documented as a string but some gateways send a number.
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: &'static str,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
}

impl ProviderResponse for StkPushResponse {
    fn external_id(&self) -> Option<&str> {
        Some(&self.checkout_request_id)
    }

    fn rejection(&self) -> Option<(String, String)> {
        rejection(&self.response_code, &self.response_description)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2cRequest {
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    pub initiator_name: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: &'static str,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    pub occasion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2bRequest {
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: &'static str,
    pub sender_identifier_type: &'static str,
    /// Spelled as the API spells it.
    pub reciever_identifier_type: &'static str,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub account_reference: String,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionStatusRequest {
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: &'static str,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    #[serde(rename = "OriginalConversationID")]
    pub original_conversation_id: String,
    pub party_a: String,
    pub identifier_type: &'static str,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    pub remarks: String,
    pub occasion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountBalanceRequest {
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: &'static str,
    pub party_a: String,
    pub identifier_type: &'static str,
    pub remarks: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReversalRequest {
    pub initiator: String,
    pub security_credential: String,
    #[serde(rename = "CommandID")]
    pub command_id: &'static str,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    pub amount: u64,
    pub receiver_party: String,
    pub reciever_identifier_type: &'static str,
    #[serde(rename = "ResultURL")]
    pub result_url: String,
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,
    pub remarks: String,
    pub occasion: String,
}

/// Acknowledgement of an asynchronous request (B2C, B2B, status, balance, reversal).
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncAcknowledgement {
    #[serde(rename = "ConversationID", default)]
    pub conversation_id: String,
    #[serde(rename = "OriginatorConversationID")]
    pub originator_conversation_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
}

impl ProviderResponse for AsyncAcknowledgement {
    fn external_id(&self) -> Option<&str> {
        Some(self.originator_conversation_id.as_str()).filter(|id| !id.is_empty())
    }

    fn rejection(&self) -> Option<(String, String)> {
        rejection(&self.response_code, &self.response_description)
    }
}

fn rejection(code: &str, description: &str) -> Option<(String, String)> {
    (code.trim() != "0").then(|| (code.to_string(), description.to_string()))
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub request_id: String,
    pub error_code: String,
    pub error_message: String,
}

/// Reads Daraja's `{requestId, errorCode, errorMessage}` error body.
///
/// Returns `None` when the body has another shape, leaving the caller to report
/// the bare HTTP status.
pub fn decode_error(status: StatusCode, body: &[u8]) -> Option<CallError> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    tracing::debug!(request_id = %body.request_id, code = %body.error_code, "daraja error body");
    Some(CallError::Provider {
        status: status.as_u16(),
        code: body.error_code,
        message: body.error_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_token_accepts_string_or_number_expiry() {
        let token: AccessToken =
            serde_json::from_value(json!({"access_token": "abc", "expires_in": "3599"})).unwrap();
        assert_eq!(token.expires_in, 3599);
        let token: AccessToken =
            serde_json::from_value(json!({"access_token": "abc", "expires_in": 3599})).unwrap();
        assert_eq!(token.expires_in, 3599);
    }

    #[test]
    fn stk_push_body_uses_api_field_names() {
        let body = serde_json::to_value(StkPushRequest {
            business_short_code: "174379".into(),
            password: "pw".into(),
            timestamp: "20250101000000".into(),
            transaction_type: TRANSACTION_TYPE_PAYBILL_ONLINE,
            amount: 10,
            party_a: "254708374149".into(),
            party_b: "174379".into(),
            phone_number: "254708374149".into(),
            callback_url: "https://cb.example/express".into(),
            account_reference: "ref".into(),
            transaction_desc: "desc".into(),
        })
        .unwrap();
        assert_eq!(body["BusinessShortCode"], "174379");
        assert_eq!(body["PartyA"], "254708374149");
        assert_eq!(body["CallBackURL"], "https://cb.example/express");
        assert_eq!(body["TransactionType"], "CustomerPayBillOnline");
    }

    #[test]
    fn non_zero_response_code_is_a_rejection() {
        let ack: AsyncAcknowledgement = serde_json::from_value(json!({
            "ConversationID": "AG_1",
            "OriginatorConversationID": "oc-1",
            "ResponseCode": "1",
            "ResponseDescription": "Rejected"
        }))
        .unwrap();
        assert_eq!(ack.rejection(), Some(("1".into(), "Rejected".into())));
        assert_eq!(ack.external_id(), Some("oc-1"));
    }

    #[test]
    fn error_body_decodes_to_provider_error() {
        let body = br#"{"requestId":"r-1","errorCode":"400.002.02","errorMessage":"Bad Request - Invalid Amount"}"#;
        let err = decode_error(StatusCode::BAD_REQUEST, body).unwrap();
        assert!(matches!(
            err,
            CallError::Provider { status: 400, ref code, .. } if code == "400.002.02"
        ));
        assert!(decode_error(StatusCode::BAD_GATEWAY, b"<html>").is_none());
    }
}
