//! pesa-gateway HTTP entrypoint.
//!
//! Routes charges, payouts and transfers to the configured M-Pesa providers and
//! reconciles their callbacks.
//!
//! Endpoints:
//! - `POST /payments/charge`, `/payments/payout`, `/payments/transfer` – create and send a payment
//! - `GET /payments/{id}` – current state, refreshed from the provider while pending
//! - `POST /payments/{id}/retry` – resend a payment whose initiation failed
//! - `POST /webhooks/daraja/{action}`, `/webhooks/quikk/mpesa/{action}` – provider callbacks
//! - `GET /health`
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` names the JSON config file, `HOST` and `PORT` the bind address
//! - `RUST_LOG` sets the log filter (default `info`)

mod config;
mod run;
mod sig_down;
mod telemetry;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        println!("{e}");
        process::exit(1)
    }
}
