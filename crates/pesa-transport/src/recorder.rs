//! Attempt recording.
//!
//! [`RequestRecorder`] persists every outbound call before it is sent and
//! finalizes the record once the call completes. It is registered as the
//! outermost [`Stage`] so finalization runs on every path, including timeouts,
//! cancellations and signing failures.

use async_trait::async_trait;
use chrono::Utc;
use http::Extensions;
use pesa_types::error::{CallError, ErrorKind, StoreError};
use pesa_types::repository::RequestRepository;
use pesa_types::request::{Request, RequestStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::call::{Call, CallMeta, Reply};
use crate::pipeline::{Next, Stage};

/// How a failed call is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The provider rejected the request (4xx).
    ClientError,
    Timeout,
    Temporary,
    Error,
}

impl Classification {
    pub fn of(error: &CallError) -> Self {
        match error.kind() {
            ErrorKind::Timeout => Classification::Timeout,
            ErrorKind::Temporary => Classification::Temporary,
            ErrorKind::ClientError => Classification::ClientError,
            _ if error.status().is_some_and(|s| (400..500).contains(&s)) => {
                Classification::ClientError
            }
            _ => Classification::Error,
        }
    }

    pub fn request_status(self) -> RequestStatus {
        match self {
            Classification::ClientError => RequestStatus::Failed,
            Classification::Timeout => RequestStatus::Timeout,
            Classification::Temporary | Classification::Error => RequestStatus::Error,
        }
    }

    fn error_kind(self, error: &CallError) -> ErrorKind {
        match self {
            Classification::ClientError => ErrorKind::ClientError,
            Classification::Timeout => ErrorKind::Timeout,
            Classification::Temporary => ErrorKind::Temporary,
            Classification::Error => error.kind(),
        }
    }
}

/// Persists one [`Request`] per outbound call.
#[derive(Clone)]
pub struct RequestRecorder {
    requests: Arc<dyn RequestRepository>,
}

impl RequestRecorder {
    pub fn new(requests: Arc<dyn RequestRepository>) -> Self {
        Self { requests }
    }

    /// Persists a fresh attempt in `received`.
    pub async fn record_request(&self, meta: &CallMeta) -> Result<Request, StoreError> {
        let request = Request::new(meta.partner, meta.operation, meta.payment_id);
        self.requests.add(request).await
    }

    /// Finalizes an attempt with the call's outcome.
    ///
    /// On success the reply's external id (if any) becomes the attempt's
    /// correlation key.
    pub async fn update_request_response(
        &self,
        mut request: Request,
        outcome: Result<&Reply, &CallError>,
        latency: Duration,
    ) -> Result<Request, StoreError> {
        request.latency_ms = Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
        request.finished_at = Some(Utc::now());
        match outcome {
            Ok(reply) => {
                request.status = RequestStatus::Succeeded;
                if let Some(external_id) = &reply.external_id {
                    request.external_id = Some(external_id.clone());
                }
                request.response = Some(reply.snapshot.clone());
            }
            Err(error) => {
                let classification = Classification::of(error);
                request.status = classification.request_status();
                request.error_kind = Some(classification.error_kind(error));
                request.error = Some(error.to_string());
            }
        }
        self.requests.update(request).await
    }
}

#[async_trait]
impl Stage for RequestRecorder {
    async fn handle(
        &self,
        call: Call,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Reply, CallError> {
        let request = self
            .record_request(&call.meta)
            .await
            .map_err(CallError::Record)?;
        extensions.insert(request.id);
        let request_id = request.id;

        let started = Instant::now();
        let outcome = next.run(call, extensions).await;
        let latency = started.elapsed();

        match &outcome {
            Ok(reply) => tracing::info!(
                request_id = %request_id,
                external_id = reply.external_id.as_deref().unwrap_or(""),
                latency_ms = latency.as_millis() as u64,
                "provider call succeeded"
            ),
            Err(error) => tracing::warn!(
                request_id = %request_id,
                kind = %error.kind(),
                latency_ms = latency.as_millis() as u64,
                "provider call failed: {error}"
            ),
        }

        if let Err(store_error) = self
            .update_request_response(request, outcome.as_ref(), latency)
            .await
        {
            tracing::error!(request_id = %request_id, "failed to finalize attempt: {store_error}");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Requests;
    use http::StatusCode;
    use pesa_types::ids::PaymentId;
    use pesa_types::request::{Operation, RequestFilter};
    use pesa_types::short_code::Service;
    use serde_json::json;

    #[tokio::test]
    async fn success_captures_external_id() {
        let requests = Arc::new(Requests::default());
        let recorder = RequestRecorder::new(requests.clone());
        let meta = CallMeta::new(Service::Daraja, Operation::C2b).for_payment(PaymentId::new());

        let request = recorder.record_request(&meta).await.unwrap();
        assert_eq!(request.status, RequestStatus::Received);

        let snapshot = json!({"id": "X"});
        let mut reply = Reply::new(StatusCode::OK, snapshot.clone(), snapshot);
        reply.external_id = Some("X".into());
        recorder
            .update_request_response(request, Ok(&reply), Duration::from_millis(12))
            .await
            .unwrap();

        let stored = requests
            .find_one(RequestFilter::ExternalId("X".into()))
            .await
            .unwrap();
        assert_eq!(stored.status, RequestStatus::Succeeded);
        assert_eq!(stored.latency_ms, Some(12));
        assert_eq!(stored.payment_id, meta.payment_id);
        assert!(stored.is_finished());
    }

    fn assert_send<T: Send>(_: T) {}

    #[tokio::test]
    async fn finalizing_a_reply_is_send() {
        let requests = Arc::new(Requests::default());
        let recorder = RequestRecorder::new(requests.clone());
        let meta = CallMeta::new(Service::Daraja, Operation::C2b);
        let request = recorder.record_request(&meta).await.unwrap();
        let reply = Reply::new(StatusCode::OK, json!({}), json!({}));
        let outcome: Result<Reply, CallError> = Ok(reply);

        let finalize =
            recorder.update_request_response(request, outcome.as_ref(), Duration::from_millis(1));
        assert_send(&outcome);
        assert_send(finalize);
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let requests = Arc::new(Requests::default());
        let recorder = RequestRecorder::new(requests.clone());
        let meta = CallMeta::new(Service::Quikk, Operation::B2c);

        let cases = [
            (
                CallError::HttpStatus {
                    status: 400,
                    body: "bad".into(),
                },
                RequestStatus::Failed,
                ErrorKind::ClientError,
            ),
            (
                CallError::Provider {
                    status: 422,
                    code: "422".into(),
                    message: "invalid msisdn".into(),
                },
                RequestStatus::Failed,
                ErrorKind::ClientError,
            ),
            (
                CallError::Timeout(Duration::from_secs(10)),
                RequestStatus::Timeout,
                ErrorKind::Timeout,
            ),
            (
                CallError::HttpStatus {
                    status: 503,
                    body: String::new(),
                },
                RequestStatus::Error,
                ErrorKind::Temporary,
            ),
            (CallError::Cancelled, RequestStatus::Error, ErrorKind::Cancelled),
        ];

        for (error, status, kind) in cases {
            let request = recorder.record_request(&meta).await.unwrap();
            let stored = recorder
                .update_request_response(request, Err(&error), Duration::ZERO)
                .await
                .unwrap();
            assert_eq!(stored.status, status, "{error}");
            assert_eq!(stored.error_kind, Some(kind), "{error}");
            assert_eq!(stored.error.as_deref(), Some(error.to_string().as_str()));
            assert!(stored.external_id.is_none());
        }
    }
}
