//! Server wiring.

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use pesa_engine::events::{LogPublisher, Publishers};
use pesa_engine::{Engine, ProviderRegistry, Repositories, handlers};
use pesa_provider_daraja::DarajaBlueprint;
use pesa_provider_quikk::QuikkBlueprint;
use pesa_transport::RequestRecorder;
use pesa_types::short_code::ShortCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;

use crate::config::{Config, ShortCodeConfig};
use crate::sig_down::SigDown;
use crate::telemetry::Telemetry;

/// Loads configuration, registers providers and short codes, and serves until
/// SIGTERM or SIGINT.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load()?;

    let repositories = Repositories::in_memory();
    let recorder = RequestRecorder::new(repositories.requests.clone());
    let mut registry = ProviderRegistry::new();
    if let Some(daraja) = config.daraja() {
        registry.register(DarajaBlueprint::from_config(daraja, recorder.clone())?);
    }
    if let Some(quikk) = config.quikk() {
        registry.register(QuikkBlueprint::from_config(quikk, recorder.clone()));
    }
    tracing::info!(?registry, "providers registered");
    register_short_codes(&repositories, &registry, config.short_codes()).await?;

    let sig_down = SigDown::try_new()?;
    let publisher = Publishers::new().with(LogPublisher);
    let engine = Engine::new(&repositories, Arc::new(registry), Arc::new(publisher))
        .with_shutdown(sig_down.cancellation_token(), sig_down.in_flight());
    let axum_state = Arc::new(engine);

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(axum_state))
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;
    sig_down.recv().await;

    Ok(())
}

/// Stores every configured short code and builds its adapter, so bad
/// credentials or a missing provider fail startup instead of the first payment.
async fn register_short_codes(
    repositories: &Repositories,
    registry: &ProviderRegistry,
    short_codes: &[ShortCodeConfig],
) -> Result<(), Box<dyn std::error::Error>> {
    for config in short_codes {
        let short_code = repositories
            .short_codes
            .add(ShortCode::from(config.clone()))
            .await?;
        registry.adapter_for(&short_code)?;
        tracing::info!(
            short_code = %short_code.short_code,
            service = %short_code.service,
            payment_type = %short_code.payment_type,
            priority = short_code.priority,
            environment = %short_code.environment,
            "short code registered"
        );
    }
    Ok(())
}
