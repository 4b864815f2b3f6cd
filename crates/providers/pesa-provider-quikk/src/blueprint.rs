use pesa_transport::{RequestRecorder, Timeouts};
use pesa_types::provider::{BlueprintError, ProviderAdapter, ProviderBlueprint};
use pesa_types::short_code::{Environment, Service, ShortCode};
use pesa_types::webhook::WebhookProcessor;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::adapter::QuikkAdapter;
use crate::config::QuikkConfig;
use crate::webhook::QuikkWebhooks;

/// Builds a [`QuikkAdapter`] per short code.
pub struct QuikkBlueprint {
    recorder: RequestRecorder,
    http: reqwest::Client,
    timeouts: Timeouts,
    environments: HashMap<Environment, Url>,
    webhooks: Arc<QuikkWebhooks>,
}

impl QuikkBlueprint {
    pub fn new(recorder: RequestRecorder, timeouts: Timeouts) -> Self {
        Self {
            recorder,
            http: reqwest::Client::new(),
            timeouts,
            environments: HashMap::new(),
            webhooks: Arc::new(QuikkWebhooks),
        }
    }

    pub fn with_environment(mut self, environment: Environment, base_url: Url) -> Self {
        self.environments.insert(environment, base_url);
        self
    }

    pub fn from_config(config: &QuikkConfig, recorder: RequestRecorder) -> Self {
        config.environments().fold(
            Self::new(recorder, config.timeouts.clone()),
            |blueprint, (environment, env_config)| {
                tracing::info!(%environment, base_url = %env_config.base_url, "quikk environment configured");
                blueprint.with_environment(environment, env_config.base_url.clone())
            },
        )
    }
}

impl ProviderBlueprint for QuikkBlueprint {
    fn service(&self) -> Service {
        Service::Quikk
    }

    fn build(&self, short_code: &ShortCode) -> Result<Arc<dyn ProviderAdapter>, BlueprintError> {
        if short_code.service != Service::Quikk {
            return Err(BlueprintError::WrongService {
                short_code: short_code.short_code.clone(),
                expected: Service::Quikk,
                actual: short_code.service,
            });
        }
        for (field, value) in [("key id", &short_code.key), ("signing secret", &short_code.secret)] {
            if value.is_empty() {
                return Err(BlueprintError::MissingCredential {
                    short_code: short_code.short_code.clone(),
                    field,
                });
            }
        }
        let base_url = self.environments.get(&short_code.environment).ok_or_else(|| {
            BlueprintError::MissingEnvironment {
                service: Service::Quikk,
                environment: short_code.environment.to_string(),
            }
        })?;
        Ok(Arc::new(QuikkAdapter::new(
            short_code.clone(),
            base_url.clone(),
            self.recorder.clone(),
            self.http.clone(),
            self.timeouts.clone(),
        )))
    }

    fn webhooks(&self) -> Arc<dyn WebhookProcessor> {
        self.webhooks.clone()
    }
}
