//! Staged execution of provider calls.
//!
//! A [`Pipeline`] runs a [`Call`] through its [`Stage`]s in registration order and
//! finally through the transport, which sends the request, enforces the deadline
//! and cancellation, and decodes the body. Each stage receives a [`Next`] handle
//! and decides whether and how to continue, so a stage can act before and after
//! the rest of the chain or short-circuit it.
//!
//! Request signing is not a stage: it lives in the `reqwest_middleware` client the
//! pipeline is built with, so it applies to the exact bytes being sent.

use async_trait::async_trait;
use http::{Extensions, StatusCode};
use pesa_types::error::CallError;
use reqwest_middleware as rqm;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::call::{Call, ProviderResponse, Reply};

/// One link of the outbound chain.
///
/// A stage may inspect or rewrite the call, short-circuit with its own result, or
/// pass the call on through `next`.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn handle(
        &self,
        call: Call,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Reply, CallError>;
}

/// The remainder of the chain, as seen from a stage.
#[derive(Clone)]
pub struct Next<'a> {
    http: &'a rqm::ClientWithMiddleware,
    stages: &'a [Arc<dyn Stage>],
}

impl Next<'_> {
    /// Hands `call` to the next stage, or sends it once no stages are left.
    pub async fn run(mut self, call: Call, extensions: &mut Extensions) -> Result<Reply, CallError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                self.stages = rest;
                stage.handle(call, extensions, self).await
            }
            None => execute(self.http, call).await,
        }
    }
}

/// Sends provider calls through a chain of [`Stage`]s, then over HTTP.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::new(http).with_stage(recorder);
/// let ack: Acknowledgement = pipeline.execute(call).await?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    http: rqm::ClientWithMiddleware,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// A pipeline with no stages over `http`.
    ///
    /// Signing and auth belong in `http`'s middleware; stages see the call before it
    /// is turned into a request.
    pub fn new(http: rqm::ClientWithMiddleware) -> Self {
        Self {
            http,
            stages: Vec::new(),
        }
    }

    /// Appends a stage. Stages added first wrap the ones added later.
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Runs `call` and decodes a 2xx body as `R`.
    pub async fn execute<R: ProviderResponse>(&self, call: Call) -> Result<R, CallError> {
        let call = call.expecting::<R>();
        let mut extensions = Extensions::new();
        let next = Next {
            http: &self.http,
            stages: &self.stages,
        };
        next.run(call, &mut extensions).await?.into_response::<R>()
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[instrument(
    name = "pesa.transport",
    skip_all,
    fields(partner = %call.meta.partner, operation = %call.meta.operation, url = %call.url)
)]
async fn execute(http: &rqm::ClientWithMiddleware, call: Call) -> Result<Reply, CallError> {
    let Call {
        method,
        url,
        headers,
        body,
        timeout,
        cancellation,
        error_decoder,
        decoder,
        ..
    } = call;

    let mut request = http.request(method, url).headers(headers).timeout(timeout);
    if let Some(body) = &body {
        request = request.json(body);
    }
    let exchange = async move {
        let response = request.send().await.map_err(|e| send_error(e, timeout))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| reqwest_error(e, timeout))?;
        Ok::<_, CallError>((status, bytes))
    };

    let (status, bytes) = tokio::select! {
        _ = cancelled(cancellation.as_ref()) => {
            tracing::debug!("call cancelled by caller");
            return Err(CallError::Cancelled);
        }
        outcome = tokio::time::timeout(timeout, exchange) => {
            outcome.map_err(|_| CallError::Timeout(timeout))??
        }
    };
    tracing::debug!(status = %status, "provider answered");

    if !status.is_success() {
        if let Some(error) = error_decoder.and_then(|decode| decode(status, &bytes)) {
            return Err(error);
        }
        return Err(http_status_error(status, &bytes));
    }
    decoder(status, &bytes)
}

fn http_status_error(status: StatusCode, body: &[u8]) -> CallError {
    CallError::HttpStatus {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

fn send_error(error: rqm::Error, timeout: Duration) -> CallError {
    match error {
        rqm::Error::Reqwest(e) => reqwest_error(e, timeout),
        // Signing middleware reports its own failures as `CallError`.
        rqm::Error::Middleware(e) => match e.downcast::<CallError>() {
            Ok(call_error) => call_error,
            Err(other) => CallError::Transport {
                message: format!("{other:#}"),
                temporary: false,
            },
        },
    }
}

fn reqwest_error(error: reqwest::Error, timeout: Duration) -> CallError {
    if error.is_timeout() {
        CallError::Timeout(timeout)
    } else {
        CallError::Transport {
            temporary: error.is_connect(),
            message: error.to_string(),
        }
    }
}
