//! Provider blueprints and the adapters built from them.
//!
//! One blueprint is registered per [`Service`]. Adapters are built lazily the
//! first time a short code is used and cached by [`ShortCodeId`], so a short
//! code's auth token survives across payments.

use dashmap::DashMap;
use pesa_types::ids::ShortCodeId;
use pesa_types::provider::{ProviderAdapter, ProviderBlueprint};
use pesa_types::short_code::{Service, ShortCode};
use pesa_types::webhook::WebhookProcessor;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::error::PaymentError;

/// Provider blueprints by [`Service`], and the adapters built from them.
///
/// # Example
///
/// ```ignore
/// let registry = ProviderRegistry::new()
///     .and_register(DarajaBlueprint::from_config(&daraja, recorder.clone())?)
///     .and_register(QuikkBlueprint::from_config(&quikk, recorder));
/// let adapter = registry.adapter_for(&short_code)?;
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    blueprints: HashMap<Service, Box<dyn ProviderBlueprint>>,
    adapters: DashMap<ShortCodeId, Arc<dyn ProviderAdapter>>,
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let services: Vec<&str> = self.blueprints.keys().map(|s| s.as_str()).collect();
        f.debug_struct("ProviderRegistry")
            .field("services", &services)
            .field("adapters", &self.adapters.len())
            .finish()
    }
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ProviderRegistry::register`].
    pub fn and_register<B: ProviderBlueprint + 'static>(mut self, blueprint: B) -> Self {
        self.register(blueprint);
        self
    }

    /// Registers `blueprint` for its service, replacing any earlier one.
    ///
    /// Adapters already built are kept.
    pub fn register<B: ProviderBlueprint + 'static>(&mut self, blueprint: B) {
        self.blueprints.insert(blueprint.service(), Box::new(blueprint));
    }

    fn blueprint(&self, service: Service) -> Result<&dyn ProviderBlueprint, PaymentError> {
        self.blueprints
            .get(&service)
            .map(|b| b.as_ref())
            .ok_or(PaymentError::NoProvider(service))
    }

    /// The adapter for `short_code`, built on first use.
    pub fn adapter_for(&self, short_code: &ShortCode) -> Result<Arc<dyn ProviderAdapter>, PaymentError> {
        if let Some(adapter) = self.adapters.get(&short_code.id) {
            return Ok(adapter.clone());
        }
        let adapter = self.blueprint(short_code.service)?.build(short_code)?;
        tracing::debug!(short_code = %short_code.short_code, service = %short_code.service, "built provider adapter");
        // A concurrent first use may have won the race; keep its adapter.
        Ok(self
            .adapters
            .entry(short_code.id)
            .or_insert(adapter)
            .value()
            .clone())
    }

    /// Callback parser for `service`.
    ///
    /// # Errors
    ///
    /// [`PaymentError::NoProvider`] when no blueprint is registered for `service`.
    pub fn webhooks(&self, service: Service) -> Result<Arc<dyn WebhookProcessor>, PaymentError> {
        Ok(self.blueprint(service)?.webhooks())
    }
}
