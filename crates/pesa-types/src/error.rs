//! Error taxonomy shared by every crate in the gateway.
//!
//! Each error type carries an explicit [`ErrorKind`]. Callers branch on the kind
//! instead of inspecting error values for capabilities, and the HTTP layer maps kinds
//! to status codes in one place.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::payment::Status;

/// Classification of a failure, independent of where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller's input was refused before anything was stored.
    InvalidRequest,
    /// No short code or provider is configured for the requested operation.
    NotConfigured,
    /// A uniqueness constraint was violated.
    Duplicate,
    NotFound,
    /// A deadline elapsed before the provider answered.
    Timeout,
    /// A transient condition (connection refused, 502/503/504, throttling).
    Temporary,
    /// The provider rejected the request as malformed (HTTP 4xx).
    ClientError,
    /// The provider answered with an explicit business error.
    ProviderError,
    DecodeError,
    Unsupported,
    /// A payment status change that violates the monotonic lifecycle.
    InvalidTransition,
    /// The caller abandoned the operation.
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Temporary => "temporary",
            ErrorKind::ClientError => "client_error",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("payment status transition {from} -> {to} rejected")]
    Transition { from: Status, to: Status },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate { .. } => ErrorKind::Duplicate,
            StoreError::Transition { .. } => ErrorKind::InvalidTransition,
            StoreError::Backend(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by an outbound provider call.
///
/// The variants keep only rendered text and HTTP status, so the type stays
/// independent of the HTTP client that produced it.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("failed to build request: {0}")]
    Build(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("call was cancelled")]
    Cancelled,
    #[error("transport failure: {message}")]
    Transport { message: String, temporary: bool },
    #[error("unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("provider rejected request (HTTP {status}, code {code}): {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),
    #[error("failed to record attempt: {0}")]
    Record(#[source] StoreError),
}

impl CallError {
    /// HTTP status the provider answered with, when there was an answer.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::HttpStatus { status, .. } | CallError::Provider { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Build(_) => ErrorKind::Internal,
            CallError::Timeout(_) => ErrorKind::Timeout,
            CallError::Cancelled => ErrorKind::Cancelled,
            CallError::Transport { temporary, .. } => {
                if *temporary {
                    ErrorKind::Temporary
                } else {
                    ErrorKind::Internal
                }
            }
            CallError::HttpStatus { status, .. } => match *status {
                408 | 429 | 502 | 503 | 504 => ErrorKind::Temporary,
                400..=499 => ErrorKind::ClientError,
                _ => ErrorKind::Internal,
            },
            CallError::Provider { .. } => ErrorKind::ProviderError,
            CallError::Decode(_) => ErrorKind::DecodeError,
            CallError::Unsupported(_) => ErrorKind::Unsupported,
            CallError::Record(e) => e.kind(),
        }
    }
}
