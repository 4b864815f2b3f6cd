//! Configuration for the pesa-gateway server.
//!
//! ```json
//! {
//!   "port": 8080,
//!   "daraja": { "sandbox": { "baseUrl": "https://sandbox.safaricom.co.ke", "certificate": "certs/sandbox.cer" } },
//!   "quikk": { "sandbox": { "baseUrl": "https://tryapi.quikk.dev" } },
//!   "shortCodes": [
//!     {
//!       "shortCode": "174379",
//!       "priority": 1,
//!       "service": "daraja",
//!       "type": "charge",
//!       "passphrase": "$DARAJA_PASSKEY",
//!       "key": "$DARAJA_CONSUMER_KEY",
//!       "secret": "$DARAJA_CONSUMER_SECRET",
//!       "callbackUrl": "https://gateway.example/webhooks/daraja"
//!     }
//!   ]
//! }
//! ```

use clap::Parser;
use pesa_provider_daraja::DarajaConfig;
use pesa_provider_quikk::QuikkConfig;
use pesa_types::config::LiteralOrEnv;
use pesa_types::ids::ShortCodeId;
use pesa_types::payment::PaymentType;
use pesa_types::short_code::{Environment, Service, ShortCode};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

/// CLI arguments for the pesa-gateway server.
#[derive(Parser, Debug)]
#[command(name = "pesa-gateway")]
#[command(about = "Mobile-money payments gateway")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Server configuration.
///
/// Host and port fall back to `$HOST` / `$PORT`, then to `0.0.0.0:8080`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    daraja: Option<DarajaConfig>,
    #[serde(default)]
    quikk: Option<QuikkConfig>,
    #[serde(default)]
    short_codes: Vec<ShortCodeConfig>,
}

/// A short code registered at startup.
///
/// Credentials may reference environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortCodeConfig {
    #[serde(default)]
    pub environment: Environment,
    pub short_code: LiteralOrEnv<String>,
    pub priority: u32,
    pub service: Service,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub initiator_name: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub initiator_password: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub passphrase: Option<LiteralOrEnv<String>>,
    pub key: LiteralOrEnv<String>,
    pub secret: LiteralOrEnv<String>,
    pub callback_url: LiteralOrEnv<Url>,
}

impl From<ShortCodeConfig> for ShortCode {
    fn from(config: ShortCodeConfig) -> Self {
        ShortCode {
            id: ShortCodeId::new(),
            environment: config.environment,
            short_code: config.short_code.into_inner(),
            priority: config.priority,
            service: config.service,
            payment_type: config.payment_type,
            initiator_name: config.initiator_name.map(LiteralOrEnv::into_inner),
            initiator_password: config.initiator_password.map(LiteralOrEnv::into_inner),
            passphrase: config.passphrase.map(LiteralOrEnv::into_inner),
            key: config.key.into_inner(),
            secret: config.secret.into_inner(),
            callback_url: config.callback_url.into_inner(),
        }
    }
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

    /// Returns the default port value with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HOST)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn daraja(&self) -> Option<&DarajaConfig> {
        self.daraja.as_ref()
    }

    pub fn quikk(&self) -> Option<&QuikkConfig> {
        self.quikk.as_ref()
    }

    pub fn short_codes(&self) -> &[ShortCodeConfig] {
        &self.short_codes
    }

    /// Loads the file named by `--config` (or `$CONFIG`, or `./config.json`).
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_providers_and_short_codes() {
        let file = write(
            r#"{
                "port": 9090,
                "host": "127.0.0.1",
                "quikk": { "sandbox": { "baseUrl": "https://tryapi.quikk.dev" } },
                "shortCodes": [{
                    "shortCode": "174379",
                    "priority": 2,
                    "service": "quikk",
                    "type": "payout",
                    "key": "key-1",
                    "secret": "$PATH",
                    "callbackUrl": "https://gateway.example/webhooks/quikk/mpesa"
                }]
            }"#,
        );
        let config = Config::load_from_path(file.path().to_path_buf()).unwrap();
        assert_eq!(config.port(), 9090);
        assert_eq!(config.host(), "127.0.0.1".parse::<IpAddr>().unwrap());
        assert!(config.daraja().is_none());
        assert!(config.quikk().is_some());

        let short_code = ShortCode::from(config.short_codes()[0].clone());
        assert_eq!(short_code.environment, Environment::Sandbox);
        assert_eq!(short_code.service, Service::Quikk);
        assert_eq!(short_code.payment_type, PaymentType::Payout);
        assert_eq!(short_code.secret, std::env::var("PATH").unwrap());
        assert_eq!(short_code.initiator_name, None);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = write("{}");
        let config = Config::load_from_path(file.path().to_path_buf()).unwrap();
        assert!(config.short_codes().is_empty());
        assert!(config.daraja().is_none());
    }

    #[test]
    fn unknown_payment_type_is_rejected() {
        let file = write(
            r#"{ "shortCodes": [{
                "shortCode": "1", "priority": 1, "service": "quikk", "type": "refund",
                "key": "k", "secret": "s", "callbackUrl": "https://cb.example"
            }] }"#,
        );
        let err = Config::load_from_path(file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::JsonParse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load_from_path(PathBuf::from("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }
}
