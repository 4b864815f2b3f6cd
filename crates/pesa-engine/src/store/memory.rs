//! In-process repositories.
//!
//! Each table sits behind one `RwLock`; uniqueness checks and status
//! transitions run under the write guard together with the write itself.

use async_trait::async_trait;
use pesa_types::error::StoreError;
use pesa_types::ids::PaymentId;
use pesa_types::payment::{Payment, PaymentFilter, StatusUpdate};
use pesa_types::repository::{
    PaymentRepository, RequestRepository, ShortCodeRepository, WebhookFilter, WebhookRepository,
};
use pesa_types::request::{Request, RequestFilter};
use pesa_types::short_code::{ShortCode, ShortCodeFilter};
use pesa_types::webhook::WebhookResult;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct PaymentTable {
    rows: HashMap<PaymentId, Payment>,
    by_idempotency_id: HashMap<String, PaymentId>,
}

#[derive(Default)]
pub struct MemoryPayments {
    table: RwLock<PaymentTable>,
}

#[async_trait]
impl PaymentRepository for MemoryPayments {
    async fn add(&self, payment: Payment) -> Result<Payment, StoreError> {
        let mut table = self.table.write().await;
        if table.by_idempotency_id.contains_key(&payment.idempotency_id) {
            return Err(StoreError::Duplicate {
                entity: "payment",
                key: payment.idempotency_id,
            });
        }
        table
            .by_idempotency_id
            .insert(payment.idempotency_id.clone(), payment.id);
        table.rows.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_one(&self, filter: PaymentFilter) -> Result<Payment, StoreError> {
        let table = self.table.read().await;
        let id = match filter {
            PaymentFilter::Id(id) => Some(id),
            PaymentFilter::IdempotencyId(key) => table.by_idempotency_id.get(&key).copied(),
        };
        id.and_then(|id| table.rows.get(&id))
            .cloned()
            .ok_or(StoreError::NotFound { entity: "payment" })
    }

    async fn update(&self, id: PaymentId, update: StatusUpdate) -> Result<Payment, StoreError> {
        let mut table = self.table.write().await;
        let payment = table
            .rows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "payment" })?;
        payment.apply(&update)?;
        Ok(payment.clone())
    }
}

#[derive(Default)]
pub struct MemoryShortCodes {
    rows: RwLock<Vec<ShortCode>>,
}

#[async_trait]
impl ShortCodeRepository for MemoryShortCodes {
    async fn add(&self, short_code: ShortCode) -> Result<ShortCode, StoreError> {
        let mut rows = self.rows.write().await;
        for existing in rows.iter() {
            if existing.payment_type != short_code.payment_type {
                continue;
            }
            if existing.service == short_code.service && existing.short_code == short_code.short_code {
                return Err(StoreError::Duplicate {
                    entity: "short code",
                    key: format!(
                        "{}/{}/{}",
                        short_code.service, short_code.short_code, short_code.payment_type
                    ),
                });
            }
            if existing.priority == short_code.priority {
                return Err(StoreError::Duplicate {
                    entity: "short code",
                    key: format!("priority {} for {}", short_code.priority, short_code.payment_type),
                });
            }
        }
        rows.push(short_code.clone());
        Ok(short_code)
    }

    async fn find_one(&self, filter: ShortCodeFilter) -> Result<ShortCode, StoreError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|sc| filter.matches(sc))
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "short code",
            })
    }

    async fn find_many(&self, filter: ShortCodeFilter) -> Result<Vec<ShortCode>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|sc| filter.matches(sc))
            .cloned()
            .collect())
    }
}

/// Attempts in insertion order, so the newest match is found scanning backwards.
#[derive(Default)]
pub struct MemoryRequests {
    rows: RwLock<Vec<Request>>,
}

#[async_trait]
impl RequestRepository for MemoryRequests {
    async fn add(&self, request: Request) -> Result<Request, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|r| r.id == request.id) {
            return Err(StoreError::Duplicate {
                entity: "request",
                key: request.id.to_string(),
            });
        }
        rows.push(request.clone());
        Ok(request)
    }

    async fn find_one(&self, filter: RequestFilter) -> Result<Request, StoreError> {
        let rows = self.rows.read().await;
        let found = match &filter {
            RequestFilter::Id(id) => rows.iter().find(|r| r.id == *id),
            RequestFilter::ExternalId(external_id) => rows
                .iter()
                .rev()
                .find(|r| r.external_id.as_deref() == Some(external_id.as_str())),
            RequestFilter::LatestInitiation(payment_id) => rows.iter().rev().find(|r| {
                r.payment_id == Some(*payment_id)
                    && r.operation.is_initiation()
                    && r.external_id.is_some()
            }),
        };
        found.cloned().ok_or(StoreError::NotFound { entity: "request" })
    }

    async fn update(&self, request: Request) -> Result<Request, StoreError> {
        let mut rows = self.rows.write().await;
        let slot = rows
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or(StoreError::NotFound { entity: "request" })?;
        *slot = request.clone();
        Ok(request)
    }
}

#[derive(Default)]
pub struct MemoryWebhooks {
    rows: RwLock<Vec<WebhookResult>>,
}

#[async_trait]
impl WebhookRepository for MemoryWebhooks {
    async fn add(&self, webhook: WebhookResult) -> Result<WebhookResult, StoreError> {
        self.rows.write().await.push(webhook.clone());
        Ok(webhook)
    }

    async fn find(&self, filter: WebhookFilter) -> Result<Vec<WebhookResult>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pesa_types::ids::ShortCodeId;
    use pesa_types::payment::{PaymentRequest, PaymentType, Status};
    use pesa_types::request::Operation;
    use pesa_types::short_code::{Environment, Service};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn payment(idempotency_id: &str) -> Payment {
        Payment::new(
            PaymentType::Charge,
            PaymentRequest {
                client_transaction_id: "order-1".into(),
                idempotency_id: idempotency_id.into(),
                source_account_number: "254708374149".into(),
                destination_account_number: "174379".into(),
                beneficiary: None,
                amount: dec!(10),
                description: None,
            },
            ShortCodeId::new(),
        )
    }

    fn short_code(service: Service, code: &str, priority: u32) -> ShortCode {
        ShortCode {
            id: ShortCodeId::new(),
            environment: Environment::Sandbox,
            short_code: code.into(),
            priority,
            service,
            payment_type: PaymentType::Charge,
            initiator_name: None,
            initiator_password: None,
            passphrase: None,
            key: "k".into(),
            secret: "s".into(),
            callback_url: url::Url::parse("https://cb.example").unwrap(),
        }
    }

    #[tokio::test]
    async fn concurrent_adds_with_one_idempotency_id_create_one_payment() {
        let payments = Arc::new(MemoryPayments::default());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let payments = payments.clone();
                tokio::spawn(async move { payments.add(payment("idem-1")).await })
            })
            .collect();
        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, StoreError::Duplicate { .. })),
            }
        }
        assert_eq!(created, 1);
        assert!(
            payments
                .find_one(PaymentFilter::IdempotencyId("idem-1".into()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn terminal_payment_rejects_further_updates() {
        let payments = MemoryPayments::default();
        let p = payments.add(payment("idem-2")).await.unwrap();
        payments
            .update(p.id, StatusUpdate::succeeded(Some("R1".into())))
            .await
            .unwrap();
        let err = payments.update(p.id, StatusUpdate::to(Status::Sent)).await.unwrap_err();
        assert!(matches!(err, StoreError::Transition { from: Status::Succeeded, to: Status::Sent }));
        let err = payments.update(p.id, StatusUpdate::failed()).await.unwrap_err();
        assert!(matches!(err, StoreError::Transition { .. }));

        let stored = payments.find_one(PaymentFilter::Id(p.id)).await.unwrap();
        assert_eq!(stored.status, Status::Succeeded);
        assert_eq!(stored.payment_reference.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn short_code_uniqueness() {
        let short_codes = MemoryShortCodes::default();
        short_codes.add(short_code(Service::Daraja, "174379", 1)).await.unwrap();
        assert!(matches!(
            short_codes.add(short_code(Service::Daraja, "174379", 2)).await,
            Err(StoreError::Duplicate { .. })
        ));
        assert!(matches!(
            short_codes.add(short_code(Service::Quikk, "600000", 1)).await,
            Err(StoreError::Duplicate { .. })
        ));
        short_codes.add(short_code(Service::Quikk, "174379", 2)).await.unwrap();
        let charge = short_codes
            .find_many(ShortCodeFilter::PaymentType(PaymentType::Charge))
            .await
            .unwrap();
        assert_eq!(charge.len(), 2);
    }

    #[tokio::test]
    async fn latest_initiation_skips_status_queries_and_unanswered_attempts() {
        let requests = MemoryRequests::default();
        let payment_id = PaymentId::new();
        let mut first = Request::new(Service::Daraja, Operation::C2b, Some(payment_id));
        first.external_id = Some("ws_CO_1".into());
        requests.add(first).await.unwrap();
        let mut query = Request::new(Service::Daraja, Operation::Status, Some(payment_id));
        query.external_id = Some("status-1".into());
        requests.add(query).await.unwrap();
        requests
            .add(Request::new(Service::Daraja, Operation::C2b, Some(payment_id)))
            .await
            .unwrap();

        let latest = requests
            .find_one(RequestFilter::LatestInitiation(payment_id))
            .await
            .unwrap();
        assert_eq!(latest.external_id.as_deref(), Some("ws_CO_1"));
        assert!(
            requests
                .find_one(RequestFilter::ExternalId("status-1".into()))
                .await
                .is_ok()
        );
    }
}
