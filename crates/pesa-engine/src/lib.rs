//! Payment orchestration and webhook reconciliation.
//!
//! - [`router::ShortCodeRouter`] picks the short code that serves a payment type.
//! - [`registry::ProviderRegistry`] maps a short code to its provider adapter.
//! - [`orchestrator::Orchestrator`] creates payments and dispatches them.
//! - [`reconciler::Reconciler`] turns provider callbacks into status updates.
//! - [`handlers`] exposes both over HTTP.
//!
//! Persistence and event delivery are ports defined in `pesa-types`; [`store`]
//! and [`events`] ship in-process implementations of them.

pub mod error;
pub mod events;
pub mod handlers;
pub mod orchestrator;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod store;

use pesa_types::events::Publisher;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use error::PaymentError;
pub use orchestrator::Orchestrator;
pub use reconciler::Reconciler;
pub use registry::ProviderRegistry;
pub use router::ShortCodeRouter;
pub use store::Repositories;

/// Everything the HTTP handlers need, shared behind an `Arc`.
pub struct Engine {
    pub orchestrator: Orchestrator,
    pub reconciler: Reconciler,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
}

impl Engine {
    /// Wires an orchestrator and a reconciler over the same stores and registry.
    pub fn new(
        repositories: &Repositories,
        registry: Arc<ProviderRegistry>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let router = ShortCodeRouter::new(repositories.short_codes.clone());
        Self {
            orchestrator: Orchestrator::new(
                repositories.payments.clone(),
                repositories.requests.clone(),
                router,
                registry.clone(),
            ),
            reconciler: Reconciler::new(
                registry,
                repositories.payments.clone(),
                repositories.requests.clone(),
                repositories.webhooks.clone(),
                publisher,
            ),
            shutdown: CancellationToken::new(),
            in_flight: TaskTracker::new(),
        }
    }

    /// Outbound calls started by handlers are cancelled when `token` is, and
    /// each payment operation is registered with `in_flight` until it returns.
    pub fn with_shutdown(mut self, token: CancellationToken, in_flight: TaskTracker) -> Self {
        self.shutdown = token;
        self.in_flight = in_flight;
        self
    }

    /// Counts `operation` as in flight until it completes or is dropped.
    pub fn track<F: Future>(&self, operation: F) -> impl Future<Output = F::Output> {
        self.in_flight.track_future(operation)
    }

    /// Token for one inbound request's outbound calls.
    pub fn cancellation(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastPublisher;

    #[tokio::test]
    async fn tracked_operations_count_as_in_flight() {
        let in_flight = TaskTracker::new();
        let engine = Engine::new(
            &Repositories::in_memory(),
            Arc::new(ProviderRegistry::new()),
            Arc::new(BroadcastPublisher::new(1)),
        )
        .with_shutdown(CancellationToken::new(), in_flight.clone());

        let operation = engine.track(async { 7 });
        assert_eq!(in_flight.len(), 1);
        assert_eq!(operation.await, 7);
        assert!(in_flight.is_empty());
    }
}
