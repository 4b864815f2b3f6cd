//! Quikk callback interpretation.
//!
//! Quikk posts to `<callback url>/<action>` with a JSON:API envelope. The
//! correlation id is an attribute whose name depends on the action:
//!
//! - `charge`: `charge_id`
//! - `payout`, `transfer`: `response_id`
//! - `search`: `resource_id` for pay-ins, `response_id` otherwise. Balance
//!   searches carry no `txn_type` and are ignored.
//!
//! `meta.status == "FAIL"` marks a failed payment.

pub mod types;

use pesa_types::amount;
use pesa_types::payment::StatusUpdate;
use pesa_types::short_code::Service;
use pesa_types::webhook::{
    Reconciliation, TransactionDetails, WebhookError, WebhookProcessor, WebhookResult,
};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use types::{CallbackAttributes, CallbackEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Charge,
    Payout,
    Transfer,
    Search,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Charge => "charge",
            Action::Payout => "payout",
            Action::Transfer => "transfer",
            Action::Search => "search",
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
            "charge" => Ok(Action::Charge),
            "payout" => Ok(Action::Payout),
            "transfer" => Ok(Action::Transfer),
            "search" => Ok(Action::Search),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuikkWebhooks;

impl WebhookProcessor for QuikkWebhooks {
    fn service(&self) -> Service {
        Service::Quikk
    }

    fn process(&self, webhook: &mut WebhookResult) -> Result<Option<Reconciliation>, WebhookError> {
        let action: Action = webhook
            .action
            .parse()
            .map_err(|_| WebhookError::UnknownAction {
                service: Service::Quikk,
                action: webhook.action.clone(),
            })?;
        let envelope: CallbackEnvelope =
            serde_json::from_slice(&webhook.body).map_err(|source| WebhookError::Decode {
                action: webhook.action.clone(),
                source,
            })?;
        webhook.data = serde_json::to_value(&envelope).ok();

        let attributes = &envelope.data.attributes;
        let correlation = match action {
            Action::Charge => attributes.charge_id.as_deref(),
            Action::Payout | Action::Transfer => attributes.response_id.as_deref(),
            Action::Search => match attributes.txn_type.as_deref() {
                None => {
                    tracing::debug!("quikk balance search result, nothing to reconcile");
                    return Ok(None);
                }
                Some("payin") => attributes.resource_id.as_deref(),
                Some(_) => attributes.response_id.as_deref(),
            },
        };
        let correlation_id = correlation
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WebhookError::MissingCorrelation {
                action: action.to_string(),
            })?
            .to_string();

        let details = details(action, attributes);
        let update = match envelope.meta.as_ref().filter(|m| m.is_failure()) {
            Some(meta) => {
                tracing::info!(
                    correlation_id = %correlation_id,
                    code = %meta.code,
                    "quikk {action} failed: {}",
                    meta.detail
                );
                StatusUpdate::failed()
            }
            None => StatusUpdate::succeeded(details.receipt.clone()),
        };
        Ok(Some(Reconciliation {
            correlation_id,
            update,
            details,
        }))
    }
}

fn details(action: Action, attributes: &CallbackAttributes) -> TransactionDetails {
    let phone = match action {
        Action::Charge => attributes.customer_no.clone(),
        Action::Payout => attributes.recipient_no.clone(),
        Action::Transfer | Action::Search => None,
    };
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
    TransactionDetails {
        amount: amount::from_json(&attributes.amount).map(|a| amount::format_fixed(a, 2)),
        receipt: non_empty(&attributes.txn_id),
        phone: non_empty(&phone),
        transaction_time: non_empty(&attributes.txn_created_at),
    }
}
