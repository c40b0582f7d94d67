//! Control protocol message types.

use herald_core::Token;
use serde::{Deserialize, Serialize};

/// Body of `POST /notify`.
///
/// The token travels as a string and is only validated by
/// [`NotifyRequest`](crate::NotifyRequest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyCommand {
    /// Subscriber token in decimal form
    pub token: String,

    /// Payload written verbatim to the subscriber
    pub command: String,
}

impl NotifyCommand {
    /// Creates a notify command.
    pub fn new(token: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            command: command.into(),
        }
    }
}

/// Body of `POST /unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeCommand {
    /// Subscriber token in decimal form
    pub token: String,

    /// Farewell written to the subscriber before it is disconnected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UnsubscribeCommand {
    /// Creates an unsubscribe command.
    pub fn new(token: impl Into<String>, message: Option<String>) -> Self {
        Self {
            token: token.into(),
            message,
        }
    }
}

/// Outcome of a control request.
///
/// Each variant is distinguishable by the caller; the daemon maps them to
/// distinct HTTP status codes as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    /// The request was carried out.
    Ok,
    /// The body was not valid JSON, lacked a field, or carried a non-numeric token.
    MalformedRequest,
    /// No active subscriber holds the token.
    UnknownToken,
    /// The subscriber exists but the write to its connection failed.
    DeliveryFailed,
}

impl ControlStatus {
    /// Returns true for [`ControlStatus::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// JSON body returned by every control route except `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ControlStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    /// Successful response.
    pub fn ok() -> Self {
        Self {
            status: ControlStatus::Ok,
            error: None,
        }
    }

    /// Failure response with a human-readable reason.
    pub fn failure(status: ControlStatus, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
        }
    }
}

/// JSON body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub subscribers: usize,
    pub version: String,
}

/// JSON body of `GET /subscribers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribersResponse {
    /// Active tokens in ascending order
    pub tokens: Vec<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_command_wire_shape() {
        let cmd = NotifyCommand::new("3", "ping");
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json, serde_json::json!({"token": "3", "command": "ping"}));
    }

    #[test]
    fn test_unsubscribe_message_is_optional() {
        let cmd: UnsubscribeCommand = serde_json::from_str(r#"{"token":"5"}"#).unwrap();
        assert_eq!(cmd.token, "5");
        assert_eq!(cmd.message, None);

        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"token":"5"}"#);
    }

    #[test]
    fn test_control_status_serialization() {
        let cases = [
            (ControlStatus::Ok, "\"ok\""),
            (ControlStatus::MalformedRequest, "\"malformed_request\""),
            (ControlStatus::UnknownToken, "\"unknown_token\""),
            (ControlStatus::DeliveryFailed, "\"delivery_failed\""),
        ];
        for (status, expected) in cases {
            assert_eq!(serde_json::to_string(&status).unwrap(), expected);
        }
    }

    #[test]
    fn test_ok_response_omits_error() {
        let json = serde_json::to_string(&ControlResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);
        assert!(ControlResponse::ok().status.is_ok());
    }

    #[test]
    fn test_subscribers_response_tokens_are_numbers() {
        let resp = SubscribersResponse {
            tokens: vec![Token::new(0), Token::new(2)],
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"tokens":[0,2]}"#);
    }

    #[test]
    fn test_failure_response_carries_error() {
        let resp = ControlResponse::failure(ControlStatus::UnknownToken, "subscriber not found: 9");
        let parsed: ControlResponse =
            serde_json::from_str(&serde_json::to_string(&resp).unwrap()).unwrap();
        assert_eq!(parsed.status, ControlStatus::UnknownToken);
        assert_eq!(parsed.error.as_deref(), Some("subscriber not found: 9"));
    }
}
