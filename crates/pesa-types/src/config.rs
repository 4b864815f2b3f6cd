//! Configuration helpers shared by the gateway and provider crates.
//!
//! Credentials do not belong in a committed config file. Any value wrapped in
//! [`LiteralOrEnv`] may instead name an environment variable:
//!
//! ```json
//! {
//!   "key": "$DARAJA_CONSUMER_KEY",
//!   "secret": "${DARAJA_CONSUMER_SECRET}",
//!   "shortCode": "174379"
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;
use std::str::FromStr;

/// A config value given either literally or as `$VAR` / `${VAR}`.
///
/// Resolution happens during deserialization, so a missing variable fails
/// config loading rather than the first request that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Variable name referenced by `raw`, if it is a reference at all.
fn env_reference(raw: &str) -> Option<&str> {
    if let Some(braced) = raw.strip_prefix("${") {
        return braced.strip_suffix('}').filter(|name| !name.is_empty());
    }
    let name = raw.strip_prefix('$')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let resolved = match env_reference(&raw) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable `{name}` referenced as `{raw}` is not set"
                ))
            })?,
            None => raw,
        };
        resolved
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("invalid value: {e}")))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_env_references() {
        assert_eq!(env_reference("$KEY"), Some("KEY"));
        assert_eq!(env_reference("${DARAJA_SECRET}"), Some("DARAJA_SECRET"));
        assert_eq!(env_reference("literal"), None);
        assert_eq!(env_reference("$"), None);
        assert_eq!(env_reference("${}"), None);
        assert_eq!(env_reference("$not-a-var"), None);
    }

    #[test]
    fn literal_values_parse_directly() {
        let value: LiteralOrEnv<u32> = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn missing_variable_fails_loading() {
        let err = serde_json::from_str::<LiteralOrEnv<String>>(
            "\"${PESA_GATEWAY_SURELY_UNSET_VARIABLE}\"",
        )
        .unwrap_err();
        assert!(err.to_string().contains("PESA_GATEWAY_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn resolves_set_variable() {
        let path = std::env::var("PATH").unwrap();
        let value: LiteralOrEnv<String> = serde_json::from_str("\"$PATH\"").unwrap();
        assert_eq!(value.into_inner(), path);
    }
}
