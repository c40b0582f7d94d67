//! herald core - shared types for the notification broker
//!
//! This crate provides the domain types shared between the daemon
//! (heraldd), the control protocol and the client CLI (herald).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod subscriber;
pub mod token;

// Re-exports for convenience
pub use error::{CoreError, CoreResult};
pub use subscriber::SubscriberState;
pub use token::{Token, TokenAllocator};
