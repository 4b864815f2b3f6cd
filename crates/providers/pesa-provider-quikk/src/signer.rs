//! HMAC request signing.
//!
//! Every request carries a `Date` header and an `Authorization` header of the form
//!
//! ```text
//! keyId="<key>",algorithm="hmac-sha256",headers="date",signature="<signature>"
//! ```
//!
//! where the signature is the url-encoded base64 HMAC-SHA256 of `date: <Date>`
//! under the short code's secret.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{AUTHORIZATION, DATE};
use http::{Extensions, HeaderValue};
use pesa_types::error::CallError;
use pesa_types::util::b64;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as sent in the `Date` header.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Url-encoded base64 HMAC-SHA256 of the signing string `date: <date>`.
pub fn signature(secret: &str, date: &str) -> Result<String, CallError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CallError::Build(format!("invalid signing secret: {e}")))?;
    mac.update(format!("date: {date}").as_bytes());
    let digest = b64::encode(mac.finalize().into_bytes());
    Ok(url::form_urlencoded::byte_serialize(digest.as_bytes()).collect())
}

/// The `Authorization` header value for a request dated `date`.
///
/// # Errors
///
/// [`CallError::Build`] if `secret` cannot key the HMAC.
pub fn authorization(key_id: &str, secret: &str, date: &str) -> Result<String, CallError> {
    Ok(format!(
        r#"keyId="{key_id}",algorithm="hmac-sha256",headers="date",signature="{}""#,
        signature(secret, date)?
    ))
}

/// Signs each outgoing request with the short code's key and secret.
#[derive(Clone)]
pub struct HmacSigner {
    key_id: String,
    secret: String,
}

impl HmacSigner {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    fn headers(&self, now: DateTime<Utc>) -> Result<(HeaderValue, HeaderValue), CallError> {
        let date = http_date(now);
        let authorization = authorization(&self.key_id, &self.secret, &date)?;
        let header = |value: String| {
            HeaderValue::from_str(&value).map_err(|e| CallError::Build(e.to_string()))
        };
        Ok((header(date)?, header(authorization)?))
    }
}

#[async_trait]
impl rqm::Middleware for HmacSigner {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let (date, authorization) = self
            .headers(Utc::now())
            .map_err(|e| rqm::Error::Middleware(e.into()))?;
        req.headers_mut().insert(DATE, date);
        req.headers_mut().insert(AUTHORIZATION, authorization);
        next.run(req, extensions).await
    }
}
