//! Typed extraction of transaction details from Daraja name/value lists.
//!
//! Each callback kind names its facts differently. The tables below pin the
//! names per kind so a renamed key shows up as a fixture test failure.

use pesa_types::amount;
use pesa_types::webhook::TransactionDetails;
use serde_json::Value;

use super::types::{Item, Parameter};

pub struct Extraction {
    pub amount: &'static str,
    /// Decimals the amount is rendered with.
    pub scale: u32,
    pub receipt: &'static str,
    pub phone: Option<&'static str>,
    pub time: &'static str,
}

pub const EXPRESS: Extraction = Extraction {
    amount: "Amount",
    scale: 0,
    receipt: "MpesaReceiptNumber",
    phone: Some("PhoneNumber"),
    time: "TransactionDate",
};

pub const B2C: Extraction = Extraction {
    amount: "TransactionAmount",
    scale: 2,
    receipt: "TransactionReceipt",
    phone: Some("ReceiverPartyPublicName"),
    time: "TransactionCompletedDateTime",
};

pub const B2B: Extraction = Extraction {
    amount: "Amount",
    scale: 2,
    receipt: "TransactionReceipt",
    phone: None,
    time: "TransCompletedTime",
};

pub const TRANSACTION_STATUS: Extraction = Extraction {
    amount: "Amount",
    scale: 2,
    receipt: "ReceiptNo",
    phone: None,
    time: "FinalisedTime",
};

pub const TRANSACTION_STATUS_KEY: &str = "TransactionStatus";
pub const ORIGINATOR_CONVERSATION_ID_KEY: &str = "OriginatorConversationID";

/// Name/value pairs from either an `Item` or a `ResultParameter` list.
pub struct Fields<'a>(Vec<(&'a str, &'a Value)>);

impl<'a> Fields<'a> {
    pub fn from_items(items: &'a [Item]) -> Self {
        Self(items.iter().map(|i| (i.name.as_str(), &i.value)).collect())
    }

    pub fn from_parameters(parameters: &'a [Parameter]) -> Self {
        Self(parameters.iter().map(|p| (p.key.as_str(), &p.value)).collect())
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    /// The value as text; numbers are rendered as-is, empty strings are absent.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn details(&self, extraction: &Extraction) -> TransactionDetails {
        TransactionDetails {
            amount: self
                .get(extraction.amount)
                .and_then(amount::from_json)
                .map(|a| amount::format_fixed(a, extraction.scale)),
            receipt: self.text(extraction.receipt),
            phone: extraction.phone.and_then(|name| self.text(name)).map(phone_only),
            transaction_time: self.text(extraction.time),
        }
    }
}

/// `ReceiverPartyPublicName` is `"<msisdn> - <name>"`.
fn phone_only(value: String) -> String {
    match value.split_once(" - ") {
        Some((phone, _)) => phone.trim().to_string(),
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(list: Value) -> Vec<Parameter> {
        serde_json::from_value(list).unwrap()
    }

    #[test]
    fn b2c_details_use_two_decimals_and_strip_names() {
        let list = params(json!([
            {"Key": "TransactionAmount", "Value": 100000},
            {"Key": "TransactionReceipt", "Value": "NLJ41HAY6Q"},
            {"Key": "ReceiverPartyPublicName", "Value": "254708374149 - John Doe"},
            {"Key": "TransactionCompletedDateTime", "Value": "19.12.2019 11:45:50"}
        ]));
        let details = Fields::from_parameters(&list).details(&B2C);
        assert_eq!(details.amount.as_deref(), Some("100000.00"));
        assert_eq!(details.receipt.as_deref(), Some("NLJ41HAY6Q"));
        assert_eq!(details.phone.as_deref(), Some("254708374149"));
        assert_eq!(details.transaction_time.as_deref(), Some("19.12.2019 11:45:50"));
    }

    #[test]
    fn missing_and_empty_values_are_absent() {
        let list = params(json!([{"Key": "TransactionReceipt", "Value": ""}]));
        let details = Fields::from_parameters(&list).details(&B2B);
        assert_eq!(details, TransactionDetails::default());
    }
}
