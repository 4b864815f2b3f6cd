//! The seam between the engine and provider integrations.
//!
//! A [`ProviderBlueprint`] is registered once per provider. It builds one
//! [`ProviderAdapter`] per short code (each adapter owns that short code's
//! credentials and auth token) and exposes the provider's [`WebhookProcessor`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{CallError, ErrorKind};
use crate::payment::Payment;
use crate::short_code::{ShortCode, Service};
use crate::webhook::WebhookProcessor;

/// Parameters of a status query.
#[derive(Debug, Clone, Copy)]
pub struct StatusQuery<'a> {
    pub payment: &'a Payment,
    /// Correlation id captured from the payment's latest initiating attempt.
    pub external_id: Option<&'a str>,
}

/// Uniform operations every provider integration offers.
///
/// Calls are recorded as attempts before they are sent. A cancelled token
/// aborts the in-flight request.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn service(&self) -> Service;

    /// Customer to business (charge).
    async fn c2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError>;

    /// Business to customer (payout).
    async fn b2c(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError>;

    /// Business to business (transfer).
    async fn b2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError>;

    /// Asks the provider to report on a payment. The answer arrives as a webhook.
    async fn status(
        &self,
        query: StatusQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), CallError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("short code {short_code} is served by {actual}, not {expected}")]
    WrongService {
        short_code: String,
        expected: Service,
        actual: Service,
    },
    #[error("short code {short_code} is missing {field}")]
    MissingCredential {
        short_code: String,
        field: &'static str,
    },
    #[error("no {environment} environment configured for {service}")]
    MissingEnvironment {
        service: Service,
        environment: String,
    },
    #[error("invalid provider configuration: {0}")]
    Invalid(String),
}

impl BlueprintError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::NotConfigured
    }
}

/// Factory for a provider's adapters and webhook processor.
pub trait ProviderBlueprint: Send + Sync {
    fn service(&self) -> Service;

    fn build(&self, short_code: &ShortCode) -> Result<Arc<dyn ProviderAdapter>, BlueprintError>;

    fn webhooks(&self) -> Arc<dyn WebhookProcessor>;
}
