//! Outbound attempt records.
//!
//! Every provider call is recorded before it is sent and finalized exactly once
//! when it completes. The provider-issued correlation id captured at completion
//! ([`Request::external_id`]) is what a later webhook presents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::ErrorKind;
use crate::ids::{PaymentId, RequestId};
use crate::short_code::Service;

/// Which adapter operation produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Auth,
    C2b,
    B2c,
    B2b,
    Status,
    Balance,
    Reversal,
}

impl Operation {
    /// Whether this operation starts a payment (as opposed to querying one).
    pub fn is_initiation(&self) -> bool {
        matches!(self, Operation::C2b | Operation::B2c | Operation::B2b)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Auth => "auth",
            Operation::C2b => "c2b",
            Operation::B2c => "b2c",
            Operation::B2b => "b2b",
            Operation::Status => "status",
            Operation::Balance => "balance",
            Operation::Reversal => "reversal",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Received,
    Succeeded,
    /// The provider rejected the request (4xx).
    Failed,
    Error,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    /// Absent for calls not tied to a payment (auth, balance).
    pub payment_id: Option<PaymentId>,
    pub external_id: Option<String>,
    pub partner: Service,
    pub operation: Operation,
    pub status: RequestStatus,
    pub latency_ms: Option<u64>,
    pub response: Option<serde_json::Value>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Request {
    pub fn new(partner: Service, operation: Operation, payment_id: Option<PaymentId>) -> Self {
        Self {
            id: RequestId::new(),
            payment_id,
            external_id: None,
            partner,
            operation,
            status: RequestStatus::Received,
            latency_ms: None,
            response: None,
            error_kind: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Lookup keys for [`RequestRepository::find_one`](crate::repository::RequestRepository::find_one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFilter {
    Id(RequestId),
    ExternalId(String),
    /// Most recent initiating attempt (c2b, b2c, b2b) of a payment that captured
    /// a correlation id.
    LatestInitiation(PaymentId),
}
