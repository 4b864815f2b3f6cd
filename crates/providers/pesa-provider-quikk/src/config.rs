use pesa_transport::Timeouts;
use pesa_types::short_code::Environment;
use serde::{Deserialize, Serialize};
use url::Url;

/// Quikk provider configuration: one API host per environment.
///
/// ```json
/// { "sandbox": { "baseUrl": "https://tryapi.quikk.dev" } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuikkConfig {
    #[serde(default)]
    pub sandbox: Option<QuikkEnvironmentConfig>,
    #[serde(default)]
    pub production: Option<QuikkEnvironmentConfig>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuikkEnvironmentConfig {
    pub base_url: Url,
}

impl QuikkConfig {
    pub fn environments(&self) -> impl Iterator<Item = (Environment, &QuikkEnvironmentConfig)> {
        [
            (Environment::Sandbox, self.sandbox.as_ref()),
            (Environment::Production, self.production.as_ref()),
        ]
        .into_iter()
        .filter_map(|(environment, config)| config.map(|c| (environment, c)))
    }
}
