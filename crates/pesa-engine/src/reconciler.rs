//! Applies provider callbacks to payments.

use pesa_types::error::StoreError;
use pesa_types::events::{PaymentEvent, Publisher};
use pesa_types::repository::{PaymentRepository, RequestRepository, WebhookRepository};
use pesa_types::request::RequestFilter;
use pesa_types::short_code::Service;
use pesa_types::webhook::{Reconciliation, WebhookOutcome, WebhookResult};
use std::sync::Arc;
use tracing::instrument;

use crate::error::PaymentError;
use crate::registry::ProviderRegistry;

/// Turns provider callbacks into payment status updates.
///
/// Every delivery is stored, whether or not it could be applied.
pub struct Reconciler {
    registry: Arc<ProviderRegistry>,
    payments: Arc<dyn PaymentRepository>,
    requests: Arc<dyn RequestRepository>,
    webhooks: Arc<dyn WebhookRepository>,
    publisher: Arc<dyn Publisher>,
}

impl Reconciler {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        payments: Arc<dyn PaymentRepository>,
        requests: Arc<dyn RequestRepository>,
        webhooks: Arc<dyn WebhookRepository>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            registry,
            payments,
            requests,
            webhooks,
            publisher,
        }
    }

    /// Interprets one delivery and applies it.
    ///
    /// The delivery is stored with its outcome whether or not it could be
    /// applied.
    #[instrument(skip_all, fields(service = %service, action = %action), err)]
    pub async fn reconcile(
        &self,
        service: Service,
        action: &str,
        body: Vec<u8>,
    ) -> Result<WebhookResult, PaymentError> {
        let mut webhook = WebhookResult::new(service, action, body);
        let result = self.apply(&mut webhook).await;
        webhook.outcome = Some(match &result {
            Ok(outcome) => outcome.clone(),
            Err(e) => WebhookOutcome::Failed {
                kind: e.kind(),
                reason: e.to_string(),
            },
        });
        let stored = match self.webhooks.add(webhook.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(webhook_id = %webhook.id, "failed to store webhook: {e}");
                webhook
            }
        };
        result.map(|_| stored)
    }

    async fn apply(&self, webhook: &mut WebhookResult) -> Result<WebhookOutcome, PaymentError> {
        let processor = self.registry.webhooks(webhook.service)?;
        let Some(reconciliation) = processor.process(webhook)? else {
            return Ok(WebhookOutcome::Ignored);
        };
        self.settle(webhook.service, reconciliation).await
    }

    async fn settle(
        &self,
        service: Service,
        reconciliation: Reconciliation,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Reconciliation {
            correlation_id,
            update,
            details,
        } = reconciliation;
        let request = self
            .requests
            .find_one(RequestFilter::ExternalId(correlation_id.clone()))
            .await?;
        let payment_id = request
            .payment_id
            .ok_or(StoreError::NotFound { entity: "payment" })?;
        match self.payments.update(payment_id, update.clone()).await {
            Ok(payment) => {
                tracing::info!(
                    payment_id = %payment_id,
                    correlation_id = %correlation_id,
                    status = %payment.status,
                    receipt = details.receipt.as_deref().unwrap_or(""),
                    amount = details.amount.as_deref().unwrap_or(""),
                    "payment reconciled"
                );
                let event = PaymentEvent::from_payment(&payment, service);
                if let Err(e) = self.publisher.publish(event).await {
                    tracing::warn!(payment_id = %payment_id, "{e}");
                }
                Ok(WebhookOutcome::Applied {
                    payment_id,
                    status: payment.status,
                })
            }
            Err(StoreError::Transition { from, to }) => {
                tracing::info!(payment_id = %payment_id, %from, %to, "payment already settled, update dropped");
                Ok(WebhookOutcome::Stale {
                    payment_id,
                    status: from,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
