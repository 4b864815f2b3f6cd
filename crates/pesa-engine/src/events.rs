//! In-process [`Publisher`] implementations.

use async_trait::async_trait;
use pesa_types::events::{PaymentEvent, PublishError, Publisher};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fans events out to in-process subscribers.
///
/// Having no subscriber is not an error. Slow subscribers lose the oldest
/// events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<PaymentEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// A receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PaymentEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Publisher for BroadcastPublisher {
    async fn publish(&self, event: PaymentEvent) -> Result<(), PublishError> {
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(receivers, "payment event broadcast"),
            Err(_) => tracing::trace!("payment event dropped, no subscribers"),
        }
        Ok(())
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, event: PaymentEvent) -> Result<(), PublishError> {
        tracing::info!(
            payment_id = %event.payment_id,
            status = %event.status,
            payment_reference = event.payment_reference.as_deref().unwrap_or(""),
            service = %event.service,
            "payment event"
        );
        Ok(())
    }
}

/// Delivers each event to every inner publisher, reporting the first failure.
#[derive(Clone, Default)]
pub struct Publishers(Vec<Arc<dyn Publisher>>);

impl Publishers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Publisher + 'static>(mut self, publisher: P) -> Self {
        self.0.push(Arc::new(publisher));
        self
    }
}

#[async_trait]
impl Publisher for Publishers {
    async fn publish(&self, event: PaymentEvent) -> Result<(), PublishError> {
        let mut first_error = None;
        for publisher in &self.0 {
            if let Err(e) = publisher.publish(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
