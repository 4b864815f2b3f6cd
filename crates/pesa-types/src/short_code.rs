//! Merchant accounts ("short codes") and the providers that serve them.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use url::Url;

use crate::ids::ShortCodeId;
use crate::payment::PaymentType;

/// Identity of an external payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// OAuth plus encrypted initiator credential API.
    Daraja,
    /// HMAC-signed JSON:API.
    Quikk,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Daraja => "daraja",
            Service::Quikk => "quikk",
        }
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown service `{0}`")]
pub struct UnknownService(String);

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daraja" => Ok(Service::Daraja),
            "quikk" => Ok(Service::Quikk),
            other => Err(UnknownService(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Sandbox => f.write_str("sandbox"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// A merchant account tied to one provider and one payment type.
///
/// Unique on `(service, short_code, payment_type)` and on `(priority, payment_type)`.
/// Lower priority wins routing.
#[derive(Clone)]
pub struct ShortCode {
    pub id: ShortCodeId,
    pub environment: Environment,
    pub short_code: String,
    pub priority: u32,
    pub service: Service,
    pub payment_type: PaymentType,
    pub initiator_name: Option<String>,
    pub initiator_password: Option<String>,
    pub passphrase: Option<String>,
    pub key: String,
    pub secret: String,
    pub callback_url: Url,
}

impl ShortCode {
    /// Joins an action segment onto the callback URL.
    ///
    /// The base is treated as a directory whether or not it ends with a slash,
    /// so `https://cb.example/daraja` and `https://cb.example/daraja/` both give
    /// `https://cb.example/daraja/<action>`.
    pub fn callback(&self, action: &str) -> Result<Url, url::ParseError> {
        let mut base = self.callback_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(action)
    }
}

impl Debug for ShortCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortCode")
            .field("id", &self.id)
            .field("environment", &self.environment)
            .field("short_code", &self.short_code)
            .field("priority", &self.priority)
            .field("service", &self.service)
            .field("payment_type", &self.payment_type)
            .field("initiator_name", &self.initiator_name)
            .field("callback_url", &self.callback_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Lookup keys for [`ShortCodeRepository`](crate::repository::ShortCodeRepository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortCodeFilter {
    Id(ShortCodeId),
    PaymentType(PaymentType),
    Service(Service),
}

impl ShortCodeFilter {
    pub fn matches(&self, short_code: &ShortCode) -> bool {
        match self {
            ShortCodeFilter::Id(id) => short_code.id == *id,
            ShortCodeFilter::PaymentType(t) => short_code.payment_type == *t,
            ShortCodeFilter::Service(s) => short_code.service == *s,
        }
    }
}
