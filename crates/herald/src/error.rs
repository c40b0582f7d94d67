//! Error types for the herald client.

use std::io;

use herald_protocol::ControlStatus;
use thiserror::Error;

/// Errors returned by the client library.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon could not be reached over HTTP.
    ///
    /// Usually the daemon is not running or listens on another port.
    #[error("Failed to reach control endpoint: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon answered but refused the request.
    #[error("Request rejected ({status:?}): {message}")]
    Rejected {
        /// Outcome reported by the daemon
        status: ControlStatus,
        /// Reason given by the daemon
        message: String,
    },

    /// The daemon answered with something that is not a control response.
    #[error("Unexpected response (HTTP {code}): {body}")]
    UnexpectedResponse {
        /// HTTP status code
        code: u16,
        /// Raw response body
        body: String,
    },

    /// I/O error on the subscription connection.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns true if the daemon reported the token as unknown.
    pub fn is_unknown_token(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                status: ControlStatus::UnknownToken,
                ..
            }
        )
    }
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let error = ClientError::Rejected {
            status: ControlStatus::UnknownToken,
            message: "subscriber not found: 7".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("UnknownToken"));
        assert!(display.contains("subscriber not found: 7"));
        assert!(error.is_unknown_token());
    }

    #[test]
    fn test_delivery_failure_is_not_unknown_token() {
        let error = ClientError::Rejected {
            status: ControlStatus::DeliveryFailed,
            message: "broken pipe".to_string(),
        };
        assert!(!error.is_unknown_token());
    }

    #[test]
    fn test_io_error_from_conversion() {
        let error: ClientError = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(error, ClientError::Io(_)));
        assert!(format!("{error}").contains("refused"));
    }
}
