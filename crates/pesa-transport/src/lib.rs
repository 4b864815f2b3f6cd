//! Outbound call machinery shared by the provider crates.
//!
//! Provider adapters describe each request as a [`Call`] and run it through a
//! [`Pipeline`]. The pipeline is built from a `reqwest_middleware` client (which
//! carries the provider's request signing) plus a chain of [`Stage`]s. The
//! [`RequestRecorder`] stage persists an attempt record around every call.
//!
//! ```text
//! build (adapter) -> RequestRecorder -> sign (middleware) -> send -> decode
//!                          ^                                           |
//!                          +------------- finalize attempt <-----------+
//! ```

pub mod call;
pub mod pipeline;
pub mod recorder;
pub mod timeouts;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use call::{Call, CallMeta, ErrorDecoder, ProviderResponse, Reply, endpoint};
pub use pipeline::{Next, Pipeline, Stage};
pub use recorder::{Classification, RequestRecorder};
pub use timeouts::Timeouts;

/// Default reqwest client wrapped for middleware.
pub fn http_client() -> reqwest_middleware::ClientWithMiddleware {
    reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build()
}
