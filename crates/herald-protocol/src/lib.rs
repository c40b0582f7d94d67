//! herald protocol - control channel messages
//!
//! This crate provides the JSON message types exchanged with the daemon's
//! control endpoint and the parsing that turns raw request bodies into
//! validated requests carrying real [`Token`](herald_core::Token)s.

pub mod message;
pub mod parse;

pub use message::{
    ControlResponse, ControlStatus, HealthResponse, NotifyCommand, SubscribersResponse,
    UnsubscribeCommand,
};
pub use parse::{NotifyRequest, ProtocolError, UnsubscribeRequest};
