//! Domain-specific error types following panic-free policy.

use thiserror::Error;

use crate::SubscriberState;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A token string could not be parsed.
    #[error("Invalid token '{value}': {reason}")]
    InvalidToken { value: String, reason: String },

    /// A subscriber lifecycle transition that the state machine forbids.
    #[error("Invalid subscriber transition: {from} -> {to}")]
    InvalidTransition {
        from: SubscriberState,
        to: SubscriberState,
    },
}

/// Result type for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;
