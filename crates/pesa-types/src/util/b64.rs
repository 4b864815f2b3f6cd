//! Standard-alphabet base64.
//!
//! Providers exchange passwords, encrypted credentials and request signatures as
//! padded standard base64. The same encoding is used to keep raw webhook bodies
//! inside JSON when a [`WebhookResult`](crate::webhook::WebhookResult) is serialized.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::{Deserialize, Deserializer, Serializer};

pub fn encode<T: AsRef<[u8]>>(input: T) -> String {
    b64.encode(input.as_ref())
}

pub fn decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, base64::DecodeError> {
    b64.decode(input.as_ref())
}

/// `#[serde(with = "crate::util::b64")]` for byte buffers.
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    decode(encoded).map_err(serde::de::Error::custom)
}
