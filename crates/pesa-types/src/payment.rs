//! Canonical payment lifecycle.
//!
//! A [`Payment`] is created in [`Status::Received`], moves to [`Status::Sent`] once a
//! provider accepted the initiating call, and is finalized by a webhook (or a status
//! query result delivered as a webhook). The synchronous response and the webhook can
//! arrive in either order, so every mutation goes through [`Payment::apply`], which
//! enforces [`Status::can_transition_to`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::amount;
use crate::error::StoreError;
use crate::ids::{PaymentId, ShortCodeId};

/// Direction of a payment, which also selects the short code that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Customer to business (C2B).
    Charge,
    /// Business to customer (B2C).
    Payout,
    /// Business to business (B2B).
    Transfer,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Charge => "charge",
            PaymentType::Payout => "payout",
            PaymentType::Transfer => "transfer",
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment type `{0}`")]
pub struct UnknownPaymentType(String);

impl FromStr for PaymentType {
    type Err = UnknownPaymentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "charge" => Ok(PaymentType::Charge),
            "payout" => Ok(PaymentType::Payout),
            "transfer" => Ok(PaymentType::Transfer),
            other => Err(UnknownPaymentType(other.to_string())),
        }
    }
}

/// Payment status.
///
/// `Succeeded`, `Failed` and `Declined` are terminal. `InitiationFailed` marks a
/// payment whose initiating call failed; it stays non-terminal so it can be retried.
/// `Retrying` is held by the one retry that claimed such a payment while its call
/// is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Received,
    Sent,
    InitiationFailed,
    Retrying,
    Succeeded,
    Failed,
    Declined,
}

impl Status {
    pub fn is_final(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed | Status::Declined)
    }

    /// A terminal status accepts nothing, so the first terminal update wins.
    /// Nothing returns to `Received`, and only `InitiationFailed` can be claimed
    /// for `Retrying`. Every other move is allowed, including a webhook
    /// finalizing a payment before the synchronous response marked it sent.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (current, _) if current.is_final() => false,
            (current, Status::Received) => *current == Status::Received,
            (current, Status::Retrying) => *current == Status::InitiationFailed,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Received => "received",
            Status::Sent => "sent",
            Status::InitiationFailed => "initiation_failed",
            Status::Retrying => "retrying",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
            Status::Declined => "declined",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only output of reconciliation: a status plus the provider receipt on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: Status) -> Self {
        Self {
            status,
            payment_reference: None,
        }
    }

    pub fn succeeded(receipt: Option<String>) -> Self {
        Self {
            status: Status::Succeeded,
            payment_reference: receipt.filter(|r| !r.is_empty()),
        }
    }

    pub fn failed() -> Self {
        Self::to(Status::Failed)
    }
}

/// A [`PaymentRequest`] that cannot become a payment.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("amount {0} must be a positive whole number")]
    Amount(Decimal),
    #[error("{0} must not be empty")]
    Missing(&'static str),
}

/// Client input for charge, payout and transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub client_transaction_id: String,
    pub idempotency_id: String,
    pub source_account_number: String,
    pub destination_account_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<String>,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PaymentRequest {
    /// Checks the request before anything is stored.
    ///
    /// Providers take whole currency units, so fractional amounts are refused
    /// here rather than rounded on the way out.
    ///
    /// # Errors
    ///
    /// [`InvalidRequest`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        let required = [
            ("idempotencyId", &self.idempotency_id),
            ("sourceAccountNumber", &self.source_account_number),
            ("destinationAccountNumber", &self.destination_account_number),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(InvalidRequest::Missing(*field));
        }
        match amount::whole_units(self.amount) {
            Some(units) if units > 0 => Ok(()),
            _ => Err(InvalidRequest::Amount(self.amount)),
        }
    }
}

/// A payment as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub client_transaction_id: String,
    pub idempotency_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub source_account_number: String,
    pub destination_account_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<String>,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub short_code_id: ShortCodeId,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Builds a fresh payment in [`Status::Received`].
    pub fn new(
        payment_type: PaymentType,
        request: PaymentRequest,
        short_code_id: ShortCodeId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            payment_type,
            client_transaction_id: request.client_transaction_id,
            idempotency_id: request.idempotency_id,
            payment_reference: None,
            source_account_number: request.source_account_number,
            destination_account_number: request.destination_account_number,
            beneficiary: request.beneficiary,
            amount: request.amount,
            description: request.description,
            short_code_id,
            status: Status::Received,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status update in place.
    ///
    /// The reference is only recorded together with [`Status::Succeeded`].
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<(), StoreError> {
        if !self.status.can_transition_to(update.status) {
            return Err(StoreError::Transition {
                from: self.status,
                to: update.status,
            });
        }
        self.status = update.status;
        if update.status == Status::Succeeded && update.payment_reference.is_some() {
            self.payment_reference = update.payment_reference.clone();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Free text sent to providers as description or remarks.
    pub fn remarks(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.client_transaction_id)
    }
}

/// Lookup keys for [`PaymentRepository::find_one`](crate::repository::PaymentRepository::find_one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFilter {
    Id(PaymentId),
    IdempotencyId(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment() -> Payment {
        Payment::new(
            PaymentType::Charge,
            PaymentRequest {
                client_transaction_id: "ctx-1".into(),
                idempotency_id: "idem-1".into(),
                source_account_number: "254700000001".into(),
                destination_account_number: "600000".into(),
                beneficiary: None,
                amount: dec!(100),
                description: None,
            },
            ShortCodeId::new(),
        )
    }

    #[test]
    fn terminal_statuses_reject_further_updates() {
        for terminal in [Status::Succeeded, Status::Failed, Status::Declined] {
            assert!(terminal.is_final());
            for next in [Status::Received, Status::Sent, Status::Succeeded, Status::Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn non_terminal_statuses_move_freely() {
        assert!(Status::Received.can_transition_to(Status::Sent));
        assert!(Status::Received.can_transition_to(Status::Succeeded));
        assert!(Status::InitiationFailed.can_transition_to(Status::Sent));
        assert!(Status::Sent.can_transition_to(Status::Failed));
        assert!(!Status::Sent.can_transition_to(Status::Received));
        assert!(!Status::InitiationFailed.is_final());
    }

    #[test]
    fn only_failed_initiations_can_be_claimed_for_retry() {
        assert!(Status::InitiationFailed.can_transition_to(Status::Retrying));
        for other in [Status::Received, Status::Sent, Status::Retrying, Status::Succeeded] {
            assert!(!other.can_transition_to(Status::Retrying), "{other}");
        }
        assert!(Status::Retrying.can_transition_to(Status::Sent));
        assert!(Status::Retrying.can_transition_to(Status::InitiationFailed));
        assert!(Status::Retrying.can_transition_to(Status::Succeeded));
        assert!(!Status::Retrying.is_final());
    }

    #[test]
    fn second_retry_claim_is_refused() {
        let mut p = payment();
        p.apply(&StatusUpdate::to(Status::InitiationFailed)).unwrap();
        p.apply(&StatusUpdate::to(Status::Retrying)).unwrap();
        let err = p.apply(&StatusUpdate::to(Status::Retrying)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Transition {
                from: Status::Retrying,
                to: Status::Retrying
            }
        ));
    }

    #[test]
    fn apply_records_reference_only_on_success() {
        let mut p = payment();
        p.apply(&StatusUpdate::to(Status::Sent)).unwrap();
        assert_eq!(p.status, Status::Sent);
        p.apply(&StatusUpdate::succeeded(Some("QK123".into()))).unwrap();
        assert_eq!(p.payment_reference.as_deref(), Some("QK123"));

        let err = p.apply(&StatusUpdate::to(Status::Sent)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Transition {
                from: Status::Succeeded,
                to: Status::Sent
            }
        ));
        assert_eq!(p.status, Status::Succeeded);
    }

    #[test]
    fn failed_update_carries_no_reference() {
        let mut p = payment();
        p.apply(&StatusUpdate::failed()).unwrap();
        assert_eq!(p.status, Status::Failed);
        assert!(p.payment_reference.is_none());
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let json = r#"{
            "clientTransactionId": "c-1",
            "idempotencyId": "i-1",
            "sourceAccountNumber": "254700000001",
            "destinationAccountNumber": "600000",
            "amount": "150.50"
        }"#;
        let request: PaymentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.amount, dec!(150.50));
        assert!(request.description.is_none());
    }

    #[test]
    fn validation_refuses_fractional_and_empty_input() {
        let mut request = PaymentRequest {
            client_transaction_id: "c-1".into(),
            idempotency_id: "i-1".into(),
            source_account_number: "254700000001".into(),
            destination_account_number: "600000".into(),
            beneficiary: None,
            amount: dec!(150.00),
            description: None,
        };
        assert_eq!(request.validate(), Ok(()));

        request.amount = dec!(10.50);
        assert_eq!(request.validate(), Err(InvalidRequest::Amount(dec!(10.50))));
        request.amount = dec!(0);
        assert_eq!(request.validate(), Err(InvalidRequest::Amount(dec!(0))));

        request.amount = dec!(10);
        request.source_account_number = " ".into();
        assert_eq!(
            request.validate(),
            Err(InvalidRequest::Missing("sourceAccountNumber"))
        );
    }

    #[test]
    fn remarks_fall_back_to_client_transaction_id() {
        let mut p = payment();
        assert_eq!(p.remarks(), "ctx-1");
        p.description = Some("rent".into());
        assert_eq!(p.remarks(), "rent");
    }
}
