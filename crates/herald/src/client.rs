//! HTTP client for the daemon's control endpoint.

use std::time::Duration;

use herald_core::Token;
use herald_protocol::{
    ControlResponse, HealthResponse, NotifyCommand, SubscribersResponse, UnsubscribeCommand,
};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Default control endpoint of a local daemon
pub const DEFAULT_CONTROL_URL: &str = "http://127.0.0.1:4000";

/// Default subscription address of a local daemon
pub const DEFAULT_SUBSCRIPTION_ADDR: &str = "127.0.0.1:3000";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Control Client
// ============================================================================

/// Client for `POST /notify`, `POST /unsubscribe` and the read-only routes.
///
/// Every non-`ok` answer from the daemon comes back as
/// [`ClientError::Rejected`] carrying the daemon's status, so callers can
/// tell an unknown token from a failed delivery.
///
/// # Example
///
/// ```rust,ignore
/// let client = ControlClient::new("http://127.0.0.1:4000")?;
/// client.notify("3", "build finished").await?;
/// client.unsubscribe("3", None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    http: reqwest::Client,
}

impl ControlClient {
    /// Creates a client for the control endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Control endpoint this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pushes `command` to the subscriber holding `token`.
    ///
    /// The token is sent as given; the daemon rejects non-numeric tokens as
    /// malformed.
    pub async fn notify(&self, token: &str, command: &str) -> Result<()> {
        let body = NotifyCommand::new(token, command);
        self.post("/notify", &body).await
    }

    /// Disconnects the subscriber holding `token`, optionally with a farewell.
    pub async fn unsubscribe(&self, token: &str, message: Option<&str>) -> Result<()> {
        let body = UnsubscribeCommand::new(token, message.map(str::to_string));
        self.post("/unsubscribe", &body).await
    }

    /// Tokens of the currently active subscribers.
    pub async fn subscribers(&self) -> Result<Vec<Token>> {
        let resp: SubscribersResponse = self.get("/subscribers").await?;
        Ok(resp.tokens)
    }

    /// Daemon liveness and subscriber count.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/health").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        let code = resp.status();
        let text = resp.text().await?;
        debug!(path, code = code.as_u16(), "Control response");

        interpret(code.as_u16(), &text)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await?;
        let code = resp.status();
        let text = resp.text().await?;

        if !code.is_success() {
            return Err(ClientError::UnexpectedResponse {
                code: code.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|_| ClientError::UnexpectedResponse {
            code: code.as_u16(),
            body: text,
        })
    }
}

/// Maps a control reply to the caller's result.
fn interpret(code: u16, body: &str) -> Result<()> {
    let response: ControlResponse =
        serde_json::from_str(body).map_err(|_| ClientError::UnexpectedResponse {
            code,
            body: body.to_string(),
        })?;

    if response.status.is_ok() {
        return Ok(());
    }

    Err(ClientError::Rejected {
        status: response.status,
        message: response.error.unwrap_or_default(),
    })
}
