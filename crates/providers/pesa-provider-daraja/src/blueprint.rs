use pesa_transport::{RequestRecorder, Timeouts};
use pesa_types::payment::PaymentType;
use pesa_types::provider::{BlueprintError, ProviderAdapter, ProviderBlueprint};
use pesa_types::short_code::{Environment, Service, ShortCode};
use pesa_types::webhook::WebhookProcessor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::adapter::DarajaAdapter;
use crate::config::DarajaConfig;
use crate::credential::{CredentialEncryptor, CredentialError};
use crate::webhook::DarajaWebhooks;

#[derive(Debug, thiserror::Error)]
pub enum DarajaConfigError {
    #[error("failed to read certificate {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("certificate {path}: {source}")]
    Credential {
        path: PathBuf,
        #[source]
        source: CredentialError,
    },
}

/// Where one environment's calls go and how its initiator passwords are encrypted.
#[derive(Debug, Clone)]
pub struct DarajaEndpoint {
    pub base_url: Url,
    pub encryptor: Arc<CredentialEncryptor>,
}

/// Builds a [`DarajaAdapter`] per short code.
pub struct DarajaBlueprint {
    recorder: RequestRecorder,
    http: reqwest::Client,
    timeouts: Timeouts,
    environments: HashMap<Environment, DarajaEndpoint>,
    webhooks: Arc<DarajaWebhooks>,
}

impl DarajaBlueprint {
    pub fn new(recorder: RequestRecorder, timeouts: Timeouts) -> Self {
        Self {
            recorder,
            http: reqwest::Client::new(),
            timeouts,
            environments: HashMap::new(),
            webhooks: Arc::new(DarajaWebhooks),
        }
    }

    pub fn with_environment(mut self, environment: Environment, endpoint: DarajaEndpoint) -> Self {
        self.environments.insert(environment, endpoint);
        self
    }

    /// Reads each configured environment's certificate from disk.
    pub fn from_config(
        config: &DarajaConfig,
        recorder: RequestRecorder,
    ) -> Result<Self, DarajaConfigError> {
        let mut blueprint = Self::new(recorder, config.timeouts.clone());
        for (environment, env_config) in config.environments() {
            let path = &env_config.certificate;
            let pem = std::fs::read_to_string(path).map_err(|source| DarajaConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let encryptor =
                CredentialEncryptor::from_pem(&pem).map_err(|source| DarajaConfigError::Credential {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!(%environment, base_url = %env_config.base_url, "daraja environment configured");
            blueprint = blueprint.with_environment(
                environment,
                DarajaEndpoint {
                    base_url: env_config.base_url.clone(),
                    encryptor: Arc::new(encryptor),
                },
            );
        }
        Ok(blueprint)
    }
}

fn require(short_code: &ShortCode, field: &'static str, value: Option<&str>) -> Result<(), BlueprintError> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(BlueprintError::MissingCredential {
            short_code: short_code.short_code.clone(),
            field,
        }),
    }
}

impl ProviderBlueprint for DarajaBlueprint {
    fn service(&self) -> Service {
        Service::Daraja
    }

    fn build(&self, short_code: &ShortCode) -> Result<Arc<dyn ProviderAdapter>, BlueprintError> {
        if short_code.service != Service::Daraja {
            return Err(BlueprintError::WrongService {
                short_code: short_code.short_code.clone(),
                expected: Service::Daraja,
                actual: short_code.service,
            });
        }
        require(short_code, "consumer key", Some(&short_code.key))?;
        require(short_code, "consumer secret", Some(&short_code.secret))?;
        match short_code.payment_type {
            PaymentType::Charge => {
                require(short_code, "passkey", short_code.passphrase.as_deref())?;
            }
            PaymentType::Payout | PaymentType::Transfer => {
                require(short_code, "initiator name", short_code.initiator_name.as_deref())?;
                require(
                    short_code,
                    "initiator password",
                    short_code.initiator_password.as_deref(),
                )?;
            }
        }
        let endpoint = self.environments.get(&short_code.environment).ok_or_else(|| {
            BlueprintError::MissingEnvironment {
                service: Service::Daraja,
                environment: short_code.environment.to_string(),
            }
        })?;
        let adapter = DarajaAdapter::new(
            short_code.clone(),
            endpoint.base_url.clone(),
            endpoint.encryptor.clone(),
            self.recorder.clone(),
            self.http.clone(),
            self.timeouts.clone(),
        )
        .map_err(|e| BlueprintError::Invalid(e.to_string()))?;
        Ok(Arc::new(adapter))
    }

    fn webhooks(&self) -> Arc<dyn WebhookProcessor> {
        self.webhooks.clone()
    }
}
