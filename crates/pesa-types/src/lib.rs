//! Core types for the pesa payments gateway.
//!
//! The gateway issues mobile-money payments (charges, payouts, transfers) through
//! external providers and reconciles the providers' asynchronous callbacks into
//! one canonical payment lifecycle. This crate holds the vocabulary every other
//! crate speaks and the ports between them. It performs no I/O of its own.
//!
//! # Modules
//!
//! - [`payment`] - payments, their statuses and the monotonic transition rule
//! - [`short_code`] - merchant accounts, providers and environments
//! - [`request`] - outbound attempt records
//! - [`webhook`] - inbound callbacks and the [`WebhookProcessor`](webhook::WebhookProcessor) contract
//! - [`provider`] - [`ProviderAdapter`](provider::ProviderAdapter) and [`ProviderBlueprint`](provider::ProviderBlueprint)
//! - [`repository`] - persistence ports
//! - [`events`] - payment events and the [`Publisher`](events::Publisher) port
//! - [`error`] - the shared [`ErrorKind`](error::ErrorKind) taxonomy
//! - [`token_cache`] - expiring single-slot cache for auth tokens
//! - [`config`] - [`LiteralOrEnv`](config::LiteralOrEnv) for secrets in config files
//! - [`amount`] - amount parsing and fixed-scale formatting

pub mod amount;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod payment;
pub mod provider;
pub mod repository;
pub mod request;
pub mod short_code;
pub mod token_cache;
pub mod util;
pub mod webhook;

pub use error::{CallError, ErrorKind, StoreError};
pub use ids::{PaymentId, RequestId, ShortCodeId, WebhookId};
pub use payment::{Payment, PaymentRequest, PaymentType, Status, StatusUpdate};
pub use short_code::{Environment, Service, ShortCode};
