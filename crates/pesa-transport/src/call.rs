//! A single outbound provider call and its decoded reply.

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use pesa_types::error::CallError;
use pesa_types::ids::PaymentId;
use pesa_types::request::Operation;
use pesa_types::short_code::Service;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Joins `path` onto `base`, treating `base` as a directory.
///
/// `https://api.example/gw` and `https://api.example/gw/` both give
/// `https://api.example/gw/<path>`.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, CallError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    base.join(path).map_err(|e| CallError::Build(e.to_string()))
}

/// A typed provider response.
///
/// `external_id` exposes the correlation id a later webhook will present.
/// `rejection` turns a 2xx body that reports a business failure into an error
/// as `(code, message)`.
///
/// Responses are shared by reference across the recorder's await points, so
/// they must be `Sync` as well as `Send`.
pub trait ProviderResponse: DeserializeOwned + Send + Sync + 'static {
    fn external_id(&self) -> Option<&str> {
        None
    }

    fn rejection(&self) -> Option<(String, String)> {
        None
    }
}

impl ProviderResponse for Value {}

/// Turns a non-2xx body into a provider-specific error, when the body has a known shape.
pub type ErrorDecoder = fn(StatusCode, &[u8]) -> Option<CallError>;

pub(crate) type Decoder = fn(StatusCode, &[u8]) -> Result<Reply, CallError>;

/// Who a call is made for. Used to record the attempt.
///
/// `payment_id` is absent for calls that concern no payment, such as auth and
/// balance queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallMeta {
    pub partner: Service,
    pub operation: Operation,
    pub payment_id: Option<PaymentId>,
}

impl CallMeta {
    /// Metadata for a call not tied to a payment.
    pub fn new(partner: Service, operation: Operation) -> Self {
        Self {
            partner,
            operation,
            payment_id: None,
        }
    }

    /// Attributes the attempt to `payment_id`.
    pub fn for_payment(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }
}

/// An outbound request together with how to record, bound and decode it.
///
/// Built by adapters and consumed by [`Pipeline::execute`](crate::Pipeline::execute).
pub struct Call {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub meta: CallMeta,
    pub cancellation: Option<CancellationToken>,
    pub(crate) error_decoder: Option<ErrorDecoder>,
    pub(crate) decoder: Decoder,
}

impl Call {
    /// A call with no body, no extra headers and the default timeout.
    pub fn new(method: Method, url: Url, meta: CallMeta) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            meta,
            cancellation: None,
            error_decoder: None,
            decoder: decode::<Value>,
        }
    }

    /// Shorthand for [`Call::new`] with `GET`.
    pub fn get(url: Url, meta: CallMeta) -> Self {
        Self::new(Method::GET, url, meta)
    }

    /// Shorthand for [`Call::new`] with `POST`.
    pub fn post(url: Url, meta: CallMeta) -> Self {
        Self::new(Method::POST, url, meta)
    }

    /// Sets the JSON body.
    ///
    /// # Errors
    ///
    /// [`CallError::Build`] if `body` does not serialize.
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, CallError> {
        let body = serde_json::to_value(body).map_err(|e| CallError::Build(e.to_string()))?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Deadline for the whole call, replacing the default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Aborts the call when `token` is cancelled.
    pub fn cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancellation = Some(token.clone());
        self
    }

    /// Decoder tried on non-2xx bodies before falling back to [`CallError::HttpStatus`].
    pub fn error_decoder(mut self, decoder: ErrorDecoder) -> Self {
        self.error_decoder = Some(decoder);
        self
    }

    pub(crate) fn expecting<R: ProviderResponse>(mut self) -> Self {
        self.decoder = decode::<R>;
        self
    }
}

impl Debug for Call {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// A decoded 2xx response.
///
/// `snapshot` is the raw JSON body as received, kept for the attempt record.
pub struct Reply {
    pub status: StatusCode,
    pub external_id: Option<String>,
    pub snapshot: Value,
    value: Box<dyn Any + Send + Sync>,
}

impl Reply {
    pub fn new<R: ProviderResponse>(status: StatusCode, snapshot: Value, response: R) -> Self {
        Self {
            status,
            external_id: response.external_id().map(str::to_owned),
            snapshot,
            value: Box::new(response),
        }
    }

    /// Recovers the typed response the reply was decoded into.
    ///
    /// # Errors
    ///
    /// [`CallError::Decode`] if `R` is not the type the call was executed with.
    pub fn into_response<R: 'static>(self) -> Result<R, CallError> {
        self.value
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| CallError::Decode("reply does not hold the expected response type".into()))
    }
}

impl Debug for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("external_id", &self.external_id)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

pub(crate) fn decode<R: ProviderResponse>(status: StatusCode, body: &[u8]) -> Result<Reply, CallError> {
    let snapshot: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| CallError::Decode(e.to_string()))?
    };
    let response: R =
        serde_json::from_value(snapshot.clone()).map_err(|e| CallError::Decode(e.to_string()))?;
    if let Some((code, message)) = response.rejection() {
        return Err(CallError::Provider {
            status: status.as_u16(),
            code,
            message,
        });
    }
    Ok(Reply::new(status, snapshot, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Accepted {
        id: String,
        code: String,
    }

    impl ProviderResponse for Accepted {
        fn external_id(&self) -> Option<&str> {
            Some(&self.id)
        }

        fn rejection(&self) -> Option<(String, String)> {
            (self.code != "0").then(|| (self.code.clone(), "rejected".to_string()))
        }
    }

    #[test]
    fn endpoint_keeps_base_path() {
        for base in ["https://api.example/gw", "https://api.example/gw/"] {
            let url = endpoint(&Url::parse(base).unwrap(), "v1/mpesa/charge").unwrap();
            assert_eq!(url.as_str(), "https://api.example/gw/v1/mpesa/charge");
        }
    }

    #[test]
    fn decode_exposes_external_id_and_snapshot() {
        let reply = decode::<Accepted>(StatusCode::OK, br#"{"id":"X","code":"0"}"#).unwrap();
        assert_eq!(reply.external_id.as_deref(), Some("X"));
        assert_eq!(reply.snapshot["code"], "0");
        let typed: Accepted = reply.into_response().unwrap();
        assert_eq!(typed.id, "X");
    }

    #[test]
    fn decode_turns_rejection_into_provider_error() {
        let err = decode::<Accepted>(StatusCode::OK, br#"{"id":"X","code":"1"}"#).unwrap_err();
        assert!(matches!(err, CallError::Provider { status: 200, ref code, .. } if code == "1"));
    }

    #[test]
    fn decode_reports_malformed_bodies() {
        let err = decode::<Accepted>(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, CallError::Decode(_)));
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let reply = decode::<Value>(StatusCode::OK, b"{}").unwrap();
        assert!(reply.into_response::<String>().is_err());
    }
}
