//! Parsing raw control request bodies into validated requests.
//!
//! Everything that can be wrong with a request (bad JSON, missing field,
//! non-numeric token) is caught here, before the registry is touched.

use herald_core::{CoreError, Token};
use thiserror::Error;

use crate::message::{NotifyCommand, UnsubscribeCommand};

/// Errors produced while validating a control request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The body was not valid JSON for the expected command.
    #[error("invalid request body: {0}")]
    InvalidJson(String),

    /// The token field was not a non-negative integer.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] CoreError),
}

impl ProtocolError {
    /// Creates a JSON error from any error type.
    pub fn json<E: std::fmt::Display>(err: E) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

/// A validated `POST /notify` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRequest {
    pub token: Token,
    pub command: String,
}

impl NotifyRequest {
    /// Parses and validates a raw request body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidJson` if the body is not a `NotifyCommand`
    /// - `ProtocolError::InvalidToken` if the token is not numeric
    pub fn from_json(body: &[u8]) -> Result<Self, ProtocolError> {
        let cmd: NotifyCommand = serde_json::from_slice(body).map_err(ProtocolError::json)?;
        Self::try_from(cmd)
    }
}

impl TryFrom<NotifyCommand> for NotifyRequest {
    type Error = ProtocolError;

    fn try_from(cmd: NotifyCommand) -> Result<Self, Self::Error> {
        Ok(Self {
            token: Token::parse(&cmd.token)?,
            command: cmd.command,
        })
    }
}

/// A validated `POST /unsubscribe` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeRequest {
    pub token: Token,
    pub message: Option<String>,
}

impl UnsubscribeRequest {
    /// Parses and validates a raw request body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidJson` if the body is not an `UnsubscribeCommand`
    /// - `ProtocolError::InvalidToken` if the token is not numeric
    pub fn from_json(body: &[u8]) -> Result<Self, ProtocolError> {
        let cmd: UnsubscribeCommand =
            serde_json::from_slice(body).map_err(ProtocolError::json)?;
        Self::try_from(cmd)
    }
}

impl TryFrom<UnsubscribeCommand> for UnsubscribeRequest {
    type Error = ProtocolError;

    fn try_from(cmd: UnsubscribeCommand) -> Result<Self, Self::Error> {
        Ok(Self {
            token: Token::parse(&cmd.token)?,
            message: cmd.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notify() {
        let req = NotifyRequest::from_json(br#"{"token":"12","command":"hello"}"#).unwrap();
        assert_eq!(req.token, Token::new(12));
        assert_eq!(req.command, "hello");
    }

    #[test]
    fn test_notify_rejects_non_json() {
        let err = NotifyRequest::from_json(b"token=1&command=x").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn test_notify_rejects_missing_command() {
        let err = NotifyRequest::from_json(br#"{"token":"1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn test_notify_rejects_numeric_json_token() {
        // The wire format carries the token as a string
        let err = NotifyRequest::from_json(br#"{"token":1,"command":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn test_notify_rejects_non_numeric_token() {
        let err = NotifyRequest::from_json(br#"{"token":"one","command":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidToken(_)));
        assert!(err.to_string().starts_with("invalid token: "));
    }

    #[test]
    fn test_parse_unsubscribe() {
        let req =
            UnsubscribeRequest::from_json(br#"{"token":"4","message":"bye"}"#).unwrap();
        assert_eq!(req.token, Token::new(4));
        assert_eq!(req.message.as_deref(), Some("bye"));

        let req = UnsubscribeRequest::from_json(br#"{"token":"4"}"#).unwrap();
        assert_eq!(req.message, None);
    }

    #[test]
    fn test_unsubscribe_rejects_negative_token() {
        let err = UnsubscribeRequest::from_json(br#"{"token":"-4"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidToken(_)));
    }
}
