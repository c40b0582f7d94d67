//! Registry errors and lifecycle events.
//!
//! This module defines the types callers see when talking to the
//! `SubscriberRegistry`:
//! - `RegistryError`: typed failures returned by registry operations
//! - `RegistryEvent`: lifecycle events published to observers
//! - `RemovalReason`: which trigger won the race to close a subscriber

use herald_core::Token;
use thiserror::Error;

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// None of these are fatal to the daemon: `NotFound` is either a caller
/// mistake or a benign race with a concurrent disconnect, and `WriteError`
/// leaves the subscriber registered so the caller can retry or unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No active subscriber holds this token.
    #[error("subscriber not found: {0}")]
    NotFound(Token),

    /// The subscriber exists but writing to its connection failed.
    #[error("failed to write to subscriber {token}: {reason}")]
    WriteError {
        /// Token of the subscriber whose connection failed
        token: Token,
        /// Underlying I/O failure
        reason: String,
    },

    /// A read loop has already been started for this subscriber.
    #[error("read loop already running for subscriber {0}")]
    ReadLoopRunning(Token),
}

impl RegistryError {
    /// Returns true for `RegistryError::NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// Registry Events
// ============================================================================

/// Events published by the registry to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A subscriber was registered and is now reachable.
    Registered {
        /// Token issued to the subscriber
        token: Token,
    },

    /// A subscriber's connection was closed and its entry discarded.
    Removed {
        /// Token of the removed subscriber
        token: Token,
        /// Which trigger closed it
        reason: RemovalReason,
    },
}

/// Why a subscriber was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// A control caller asked for the subscriber to be unsubscribed.
    Explicit,

    /// The read loop saw EOF or a read error on the connection.
    PeerDisconnected,

    /// The daemon is shutting down and drained every subscriber.
    Shutdown,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicitly unsubscribed"),
            Self::PeerDisconnected => write!(f, "peer disconnected"),
            Self::Shutdown => write!(f, "daemon shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NotFound(Token::new(3));
        assert_eq!(err.to_string(), "subscriber not found: 3");

        let err = RegistryError::WriteError {
            token: Token::new(4),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.to_string(), "failed to write to subscriber 4: broken pipe");

        let err = RegistryError::ReadLoopRunning(Token::new(5));
        assert_eq!(err.to_string(), "read loop already running for subscriber 5");
    }

    #[test]
    fn test_is_not_found() {
        assert!(RegistryError::NotFound(Token::new(0)).is_not_found());
        assert!(!RegistryError::ReadLoopRunning(Token::new(0)).is_not_found());
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::Explicit.to_string(), "explicitly unsubscribed");
        assert_eq!(RemovalReason::PeerDisconnected.to_string(), "peer disconnected");
        assert_eq!(RemovalReason::Shutdown.to_string(), "daemon shutdown");
    }
}
