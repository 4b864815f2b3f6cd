//! Small helpers shared by the provider crates.
//!
//! - [`b64`] - standard base64 for credentials, signatures and stored webhook bodies

pub mod b64;
