//! OAuth client credentials and the bearer signing middleware.

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{Extensions, HeaderValue, StatusCode};
use pesa_transport::{Call, CallMeta, Pipeline, endpoint};
use pesa_types::error::CallError;
use pesa_types::request::Operation;
use pesa_types::short_code::Service;
use pesa_types::token_cache::TokenCache;
use pesa_types::util::b64;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::types::{AccessToken, decode_error};

/// Tokens are treated as expired this long before the provider says they are.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fetches and caches access tokens for one consumer key.
pub struct Authenticator {
    pipeline: Pipeline,
    url: Url,
    basic: HeaderValue,
    timeout: Duration,
    cache: TokenCache<String>,
}

impl Authenticator {
    pub fn new(
        pipeline: Pipeline,
        base_url: &Url,
        key: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<Self, CallError> {
        let mut url = endpoint(base_url, "oauth/v1/generate")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "client_credentials");
        let basic = HeaderValue::from_str(&format!("Basic {}", b64::encode(format!("{key}:{secret}"))))
            .map_err(|e| CallError::Build(e.to_string()))?;
        Ok(Self {
            pipeline,
            url,
            basic,
            timeout,
            cache: TokenCache::new(),
        })
    }

    /// A valid access token, fetched at most once per expiry window.
    pub async fn token(&self) -> Result<String, CallError> {
        self.cache.get_or_refresh(|| self.fetch()).await
    }

    /// Drops the cached token so the next call authenticates again.
    pub async fn invalidate(&self) {
        self.cache.clear().await;
    }

    async fn fetch(&self) -> Result<(String, Instant), CallError> {
        let call = Call::get(self.url.clone(), CallMeta::new(Service::Daraja, Operation::Auth))
            .header(AUTHORIZATION, self.basic.clone())
            .timeout(self.timeout)
            .error_decoder(decode_error);
        let token: AccessToken = self.pipeline.execute(call).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(lifetime_secs = lifetime.as_secs(), "obtained daraja access token");
        Ok((token.access_token, Instant::now() + lifetime))
    }
}

/// Attaches `Authorization: Bearer <token>` to every outgoing request.
///
/// A 401 answer drops the cached token.
#[derive(Clone)]
pub struct BearerAuth {
    auth: Arc<Authenticator>,
}

impl BearerAuth {
    pub fn new(auth: Arc<Authenticator>) -> Self {
        Self { auth }
    }
}

fn middleware_error(error: CallError) -> rqm::Error {
    rqm::Error::Middleware(error.into())
}

#[async_trait]
impl rqm::Middleware for BearerAuth {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let token = self.auth.token().await.map_err(middleware_error)?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| middleware_error(CallError::Build(e.to_string())))?;
        req.headers_mut().insert(AUTHORIZATION, value);

        let response = next.run(req, extensions).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("daraja rejected access token, dropping it");
            self.auth.invalidate().await;
        }
        Ok(response)
    }
}
