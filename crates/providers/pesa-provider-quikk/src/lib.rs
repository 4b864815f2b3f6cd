//! Quikk provider.
//!
//! Quikk exposes M-Pesa charges, payouts and transfers as a JSON:API. Requests
//! are signed with an HMAC of the `Date` header ([`signer::HmacSigner`]) and
//! results arrive as callbacks interpreted by [`QuikkWebhooks`].

pub mod adapter;
pub mod blueprint;
pub mod config;
pub mod signer;
pub mod types;
pub mod webhook;

pub use adapter::QuikkAdapter;
pub use blueprint::QuikkBlueprint;
pub use config::{QuikkConfig, QuikkEnvironmentConfig};
pub use webhook::QuikkWebhooks;
