//! Repository wiring.

pub mod memory;

use pesa_types::repository::{
    PaymentRepository, RequestRepository, ShortCodeRepository, WebhookRepository,
};
use std::sync::Arc;

/// The four repositories the engine works against.
#[derive(Clone)]
pub struct Repositories {
    pub payments: Arc<dyn PaymentRepository>,
    pub short_codes: Arc<dyn ShortCodeRepository>,
    pub requests: Arc<dyn RequestRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
}

impl Repositories {
    /// Process-local stores; nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            payments: Arc::new(memory::MemoryPayments::default()),
            short_codes: Arc::new(memory::MemoryShortCodes::default()),
            requests: Arc::new(memory::MemoryRequests::default()),
            webhooks: Arc::new(memory::MemoryWebhooks::default()),
        }
    }
}
