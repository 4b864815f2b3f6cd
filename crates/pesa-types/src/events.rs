//! Payment events emitted after reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PaymentId;
use crate::payment::{Payment, Status};
use crate::short_code::Service;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub payment_id: PaymentId,
    pub status: Status,
    pub payment_reference: Option<String>,
    pub service: Service,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn from_payment(payment: &Payment, service: Service) -> Self {
        Self {
            payment_id: payment.id,
            status: payment.status,
            payment_reference: payment.payment_reference.clone(),
            service,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to publish payment event: {0}")]
pub struct PublishError(pub String);

/// Delivery is best-effort; callers log failures and carry on.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: PaymentEvent) -> Result<(), PublishError>;
}
