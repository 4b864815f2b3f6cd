//! Daraja callback interpretation.
//!
//! Daraja posts results to `<callback url>/<action>`. The action selects the
//! payload shape:
//!
//! | action               | shape                     | correlation                                   |
//! |----------------------|---------------------------|-----------------------------------------------|
//! | `express`            | `Body.stkCallback`        | `CheckoutRequestID`                           |
//! | `b2c`, `b2b`         | `Result`                  | `OriginatorConversationID`                    |
//! | `transaction-status` | `Result`                  | `OriginatorConversationID` result parameter   |
//! | `balance`, `timeout` | ignored                   |                                               |
//! | `reversal`           | not supported             |                                               |
//!
//! For transaction status results the top-level `ResultCode` describes the query,
//! not the payment. The payment outcome is the `TransactionStatus` parameter.

mod fields;
pub mod types;

use pesa_types::payment::StatusUpdate;
use pesa_types::short_code::Service;
use pesa_types::webhook::{Reconciliation, WebhookError, WebhookProcessor, WebhookResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use fields::{Extraction, Fields};
use types::{AsyncResult, ResultEnvelope, StkCallback, StkCallbackEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Express,
    B2c,
    B2b,
    TransactionStatus,
    Reversal,
    Balance,
    Timeout,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Express => "express",
            Action::B2c => "b2c",
            Action::B2b => "b2b",
            Action::TransactionStatus => "transaction-status",
            Action::Reversal => "reversal",
            Action::Balance => "balance",
            Action::Timeout => "timeout",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "express" => Ok(Action::Express),
            "b2c" => Ok(Action::B2c),
            "b2b" => Ok(Action::B2b),
            "transaction-status" => Ok(Action::TransactionStatus),
            "reversal" => Ok(Action::Reversal),
            "balance" => Ok(Action::Balance),
            "timeout" => Ok(Action::Timeout),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DarajaWebhooks;

impl WebhookProcessor for DarajaWebhooks {
    fn service(&self) -> Service {
        Service::Daraja
    }

    fn process(&self, webhook: &mut WebhookResult) -> Result<Option<Reconciliation>, WebhookError> {
        let action: Action = webhook
            .action
            .parse()
            .map_err(|_| WebhookError::UnknownAction {
                service: Service::Daraja,
                action: webhook.action.clone(),
            })?;
        match action {
            Action::Express => {
                let envelope: StkCallbackEnvelope = decode(webhook)?;
                express(&envelope.body.stk_callback).map(Some)
            }
            Action::B2c => {
                let envelope: ResultEnvelope = decode(webhook)?;
                payment_result(action, &envelope.result, &fields::B2C).map(Some)
            }
            Action::B2b => {
                let envelope: ResultEnvelope = decode(webhook)?;
                payment_result(action, &envelope.result, &fields::B2B).map(Some)
            }
            Action::TransactionStatus => {
                let envelope: ResultEnvelope = decode(webhook)?;
                transaction_status(&envelope.result)
            }
            Action::Reversal => Err(WebhookError::Unsupported {
                service: Service::Daraja,
                action: action.to_string(),
            }),
            Action::Balance | Action::Timeout => {
                webhook.data = serde_json::from_slice(&webhook.body).ok();
                tracing::debug!(action = %action, "daraja callback does not concern a payment");
                Ok(None)
            }
        }
    }
}

/// Decodes the body as `T` and keeps the decoded form on the webhook.
fn decode<T: DeserializeOwned + Serialize>(webhook: &mut WebhookResult) -> Result<T, WebhookError> {
    let payload: T =
        serde_json::from_slice(&webhook.body).map_err(|source| WebhookError::Decode {
            action: webhook.action.clone(),
            source,
        })?;
    webhook.data = serde_json::to_value(&payload).ok();
    Ok(payload)
}

fn correlation(action: Action, id: &str) -> Result<String, WebhookError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(WebhookError::MissingCorrelation {
            action: action.to_string(),
        });
    }
    Ok(id.to_string())
}

fn express(callback: &StkCallback) -> Result<Reconciliation, WebhookError> {
    let correlation_id = correlation(Action::Express, &callback.checkout_request_id)?;
    let items = callback
        .callback_metadata
        .as_ref()
        .map(|m| m.items.as_slice())
        .unwrap_or_default();
    let details = Fields::from_items(items).details(&fields::EXPRESS);
    let update = if callback.result_code.is_success() {
        StatusUpdate::succeeded(details.receipt.clone())
    } else {
        tracing::info!(
            checkout_request_id = %correlation_id,
            code = %callback.result_code.0,
            "stk push failed: {}",
            callback.result_desc
        );
        StatusUpdate::failed()
    };
    Ok(Reconciliation {
        correlation_id,
        update,
        details,
    })
}

fn parameters(result: &AsyncResult) -> Fields<'_> {
    let list = result
        .result_parameters
        .as_ref()
        .map(|p| p.parameters.as_slice())
        .unwrap_or_default();
    Fields::from_parameters(list)
}

fn payment_result(
    action: Action,
    result: &AsyncResult,
    extraction: &Extraction,
) -> Result<Reconciliation, WebhookError> {
    let correlation_id = correlation(action, &result.originator_conversation_id)?;
    let mut details = parameters(result).details(extraction);
    if action == Action::B2b && details.receipt.is_none() && !result.transaction_id.is_empty() {
        details.receipt = Some(result.transaction_id.clone());
    }
    let update = if result.result_code.is_success() {
        StatusUpdate::succeeded(details.receipt.clone())
    } else {
        tracing::info!(
            originator_conversation_id = %correlation_id,
            code = %result.result_code.0,
            "{action} failed: {}",
            result.result_desc
        );
        StatusUpdate::failed()
    };
    Ok(Reconciliation {
        correlation_id,
        update,
        details,
    })
}

fn transaction_status(result: &AsyncResult) -> Result<Option<Reconciliation>, WebhookError> {
    let params = parameters(result);
    let Some(status) = params.text(fields::TRANSACTION_STATUS_KEY) else {
        // No payment outcome: the query itself failed or returned nothing usable.
        tracing::info!(
            code = %result.result_code.0,
            "transaction status query returned no outcome: {}",
            result.result_desc
        );
        return Ok(None);
    };
    let original = params
        .text(fields::ORIGINATOR_CONVERSATION_ID_KEY)
        .unwrap_or_default();
    let correlation_id = correlation(Action::TransactionStatus, &original)?;
    let details = params.details(&fields::TRANSACTION_STATUS);
    let update = if status == "Completed" {
        StatusUpdate::succeeded(details.receipt.clone())
    } else {
        StatusUpdate::failed()
    };
    Ok(Some(Reconciliation {
        correlation_id,
        update,
        details,
    }))
}
