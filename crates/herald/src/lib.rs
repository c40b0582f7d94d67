//! herald client - talk to a running herald daemon
//!
//! This library backs the `herald` command line tool:
//! - `subscribe` - hold a subscription open and stream notifications
//! - `client` - `ControlClient` for the daemon's HTTP control endpoint
//! - `error` - `ClientError` and the crate `Result` alias

pub mod client;
pub mod error;
pub mod subscribe;

pub use client::{ControlClient, DEFAULT_CONTROL_URL, DEFAULT_SUBSCRIPTION_ADDR};
pub use error::{ClientError, Result};
pub use subscribe::subscribe;
