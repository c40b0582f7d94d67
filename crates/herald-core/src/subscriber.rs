//! Subscriber lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Lifecycle of a registered subscriber.
///
/// ```text
/// Active ──▶ Closing ──▶ Closed
/// ```
///
/// `Active` is entered on registration. Whoever moves an entry to `Closing`
/// first (the read loop noticing EOF, or an explicit unsubscribe) owns the
/// teardown; everyone else sees the subscriber as gone. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    /// Registered and reachable by notify/unsubscribe.
    Active,
    /// Teardown in progress: farewell being written, connection being closed.
    Closing,
    /// Connection closed and entry discarded.
    Closed,
}

impl SubscriberState {
    /// Returns true if the subscriber can still receive notifications.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Validates and performs a transition to `next`.
    ///
    /// Only `Active -> Closing` and `Closing -> Closed` are allowed.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` for every other pair,
    /// including self-transitions.
    pub fn transition(self, next: SubscriberState) -> CoreResult<SubscriberState> {
        match (self, next) {
            (Self::Active, Self::Closing) | (Self::Closing, Self::Closed) => Ok(next),
            (from, to) => Err(CoreError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let closing = SubscriberState::Active
            .transition(SubscriberState::Closing)
            .unwrap();
        assert_eq!(closing, SubscriberState::Closing);

        let closed = closing.transition(SubscriberState::Closed).unwrap();
        assert_eq!(closed, SubscriberState::Closed);
        assert!(!closed.is_active());
    }

    #[test]
    fn test_never_reenters_active() {
        for from in [
            SubscriberState::Active,
            SubscriberState::Closing,
            SubscriberState::Closed,
        ] {
            assert!(from.transition(SubscriberState::Active).is_err());
        }
    }

    #[test]
    fn test_cannot_skip_closing() {
        let err = SubscriberState::Active
            .transition(SubscriberState::Closed)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: SubscriberState::Active,
                to: SubscriberState::Closed,
            }
        );
    }

    #[test]
    fn test_closing_twice_is_rejected() {
        assert!(SubscriberState::Closing
            .transition(SubscriberState::Closing)
            .is_err());
    }

    #[test]
    fn test_only_active_is_active() {
        assert!(SubscriberState::Active.is_active());
        assert!(!SubscriberState::Closing.is_active());
        assert!(!SubscriberState::Closed.is_active());
    }
}
