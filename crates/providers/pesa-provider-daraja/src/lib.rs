//! Daraja (Safaricom M-Pesa) provider.
//!
//! - [`DarajaAdapter`]: STK push (charge), B2C (payout), B2B (transfer) and
//!   transaction status for one short code, plus account balance and reversal.
//!   Requests carry an OAuth bearer token cached per short code.
//! - [`DarajaWebhooks`]: interprets result callbacks into reconciliations.
//! - [`DarajaBlueprint`]: builds adapters from short codes and the configured
//!   environments.

pub mod adapter;
pub mod auth;
pub mod blueprint;
pub mod config;
pub mod credential;
pub mod types;
pub mod webhook;

pub use adapter::DarajaAdapter;
pub use blueprint::{DarajaBlueprint, DarajaConfigError, DarajaEndpoint};
pub use config::{DarajaConfig, DarajaEnvironmentConfig};
pub use credential::CredentialEncryptor;
pub use webhook::DarajaWebhooks;
