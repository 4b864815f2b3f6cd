//! Persistence ports.
//!
//! Implementations must be safe to share across tasks and must report missing
//! rows and uniqueness violations as [`StoreError::NotFound`] and
//! [`StoreError::Duplicate`]. `PaymentRepository::update` checks the status
//! transition under the same lock (or transaction) as the write.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ids::{PaymentId, WebhookId};
use crate::payment::{Payment, PaymentFilter, StatusUpdate};
use crate::request::{Request, RequestFilter};
use crate::short_code::{Service, ShortCode, ShortCodeFilter};
use crate::webhook::WebhookResult;

/// Storage for [`Payment`]s. The idempotency id is unique.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fails with `Duplicate` when the idempotency id is already taken.
    async fn add(&self, payment: Payment) -> Result<Payment, StoreError>;

    async fn find_one(&self, filter: PaymentFilter) -> Result<Payment, StoreError>;

    /// Applies `update` atomically, failing with `Transition` when the current
    /// status does not accept it.
    async fn update(&self, id: PaymentId, update: StatusUpdate) -> Result<Payment, StoreError>;
}

/// Storage for configured [`ShortCode`]s.
#[async_trait]
pub trait ShortCodeRepository: Send + Sync {
    /// Fails with `Duplicate` on `(service, short_code, type)` or `(priority, type)`.
    async fn add(&self, short_code: ShortCode) -> Result<ShortCode, StoreError>;

    async fn find_one(&self, filter: ShortCodeFilter) -> Result<ShortCode, StoreError>;

    async fn find_many(&self, filter: ShortCodeFilter) -> Result<Vec<ShortCode>, StoreError>;
}

/// Storage for outbound call attempts.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn add(&self, request: Request) -> Result<Request, StoreError>;

    async fn find_one(&self, filter: RequestFilter) -> Result<Request, StoreError>;

    /// Replaces the stored attempt with the same id.
    async fn update(&self, request: Request) -> Result<Request, StoreError>;
}

/// Conjunction of optional criteria; the default matches every webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookFilter {
    pub id: Option<WebhookId>,
    pub service: Option<Service>,
    pub action: Option<String>,
}

impl WebhookFilter {
    pub fn matches(&self, webhook: &WebhookResult) -> bool {
        self.id.is_none_or(|id| webhook.id == id)
            && self.service.is_none_or(|s| webhook.service == s)
            && self.action.as_deref().is_none_or(|a| webhook.action == a)
    }
}

/// Append-only storage for received callbacks.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn add(&self, webhook: WebhookResult) -> Result<WebhookResult, StoreError>;

    /// Matching deliveries, oldest first.
    async fn find(&self, filter: WebhookFilter) -> Result<Vec<WebhookResult>, StoreError>;
}
