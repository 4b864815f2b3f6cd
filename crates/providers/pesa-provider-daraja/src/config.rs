//! Daraja provider configuration.
//!
//! ```json
//! {
//!   "sandbox": {
//!     "baseUrl": "https://sandbox.safaricom.co.ke",
//!     "certificate": "certs/sandbox.cer"
//!   },
//!   "timeouts": { "defaultSecs": 10, "authSecs": 30 }
//! }
//! ```
//!
//! Only environments that are configured can serve short codes.

use pesa_transport::Timeouts;
use pesa_types::short_code::Environment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub const SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DarajaConfig {
    #[serde(default)]
    pub sandbox: Option<DarajaEnvironmentConfig>,
    #[serde(default)]
    pub production: Option<DarajaEnvironmentConfig>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl DarajaConfig {
    pub fn environments(&self) -> impl Iterator<Item = (Environment, &DarajaEnvironmentConfig)> {
        [
            (Environment::Sandbox, self.sandbox.as_ref()),
            (Environment::Production, self.production.as_ref()),
        ]
        .into_iter()
        .filter_map(|(environment, config)| config.map(|c| (environment, c)))
    }
}

/// One Daraja environment: API host plus the certificate initiator
/// passwords are encrypted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DarajaEnvironmentConfig {
    pub base_url: Url,
    /// PEM certificate or public key file.
    pub certificate: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_configured_environments_only() {
        let config: DarajaConfig = serde_json::from_str(
            r#"{
                "sandbox": {"baseUrl": "https://sandbox.safaricom.co.ke", "certificate": "sandbox.cer"},
                "timeouts": {"authSecs": 5}
            }"#,
        )
        .unwrap();
        let environments: Vec<_> = config.environments().map(|(e, _)| e).collect();
        assert_eq!(environments, vec![Environment::Sandbox]);
        assert_eq!(
            config.timeouts.for_operation(pesa_types::request::Operation::Auth),
            Duration::from_secs(5)
        );
    }
}
