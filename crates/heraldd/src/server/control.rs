//! HTTP control endpoint.
//!
//! Routes:
//! - `POST /notify` `{"token": "3", "command": "..."}` - push a message to one subscriber
//! - `POST /unsubscribe` `{"token": "3", "message": "..."}` - disconnect one subscriber
//! - `GET /subscribers` - tokens of the active subscribers
//! - `GET /health` - liveness and subscriber count
//!
//! Bodies are taken as raw bytes and validated by `herald_protocol`, so every
//! malformed request (bad JSON, missing field, non-numeric token) gets the
//! same `400 malformed_request` answer and never reaches the registry.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use herald_protocol::{
    ControlResponse, ControlStatus, HealthResponse, NotifyRequest, ProtocolError,
    SubscribersResponse, UnsubscribeRequest,
};

use super::ServerError;
use crate::registry::{RegistryError, SubscriberRegistry};

/// Farewell used when `/unsubscribe` carries no message
pub const DEFAULT_UNSUBSCRIBE_MESSAGE: &str = "unsubscribed by control";

type ControlReply = (StatusCode, Json<ControlResponse>);

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
struct ControlState {
    registry: SubscriberRegistry,
}

/// Builds the control router.
pub fn router(registry: SubscriberRegistry) -> Router {
    Router::new()
        .route("/notify", post(notify_handler))
        .route("/unsubscribe", post(unsubscribe_handler))
        .route("/subscribers", get(subscribers_handler))
        .route("/health", get(health_handler))
        .with_state(ControlState { registry })
}

/// HTTP server for the control endpoint.
pub struct ControlServer {
    registry: SubscriberRegistry,
    cancel_token: CancellationToken,
}

impl ControlServer {
    /// Creates a new control server.
    pub fn new(registry: SubscriberRegistry, cancel_token: CancellationToken) -> Self {
        Self {
            registry,
            cancel_token,
        }
    }

    /// Binds `addr` and serves until cancelled.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound
    /// - `ServerError::Io` if the HTTP server fails
    pub async fn run(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;

        self.serve(listener).await
    }

    /// Serves on an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        match listener.local_addr() {
            Ok(addr) => info!(address = %addr, "Control server listening"),
            Err(e) => warn!(error = %e, "Control server listening on unknown address"),
        }

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router(self.registry.clone()))
            .with_graceful_shutdown(async move { cancel_token.cancelled().await })
            .await?;

        info!("Control server stopped");
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /notify
async fn notify_handler(State(state): State<ControlState>, body: Bytes) -> ControlReply {
    let request = match NotifyRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => return malformed(e),
    };

    match state.registry.notify(request.token, request.command).await {
        Ok(()) => reply(ControlResponse::ok()),
        Err(e) => registry_failure(e),
    }
}

/// POST /unsubscribe
async fn unsubscribe_handler(State(state): State<ControlState>, body: Bytes) -> ControlReply {
    let request = match UnsubscribeRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => return malformed(e),
    };

    let farewell = request
        .message
        .unwrap_or_else(|| DEFAULT_UNSUBSCRIBE_MESSAGE.to_string());

    match state.registry.unsubscribe(request.token, farewell).await {
        Ok(()) => reply(ControlResponse::ok()),
        Err(e) => registry_failure(e),
    }
}

/// GET /subscribers
async fn subscribers_handler(State(state): State<ControlState>) -> Json<SubscribersResponse> {
    Json(SubscribersResponse {
        tokens: state.registry.tokens(),
    })
}

/// GET /health
async fn health_handler(State(state): State<ControlState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        subscribers: state.registry.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Status mapping
// ============================================================================

/// HTTP status for each control outcome.
pub(crate) fn status_code(status: ControlStatus) -> StatusCode {
    match status {
        ControlStatus::Ok => StatusCode::OK,
        ControlStatus::MalformedRequest => StatusCode::BAD_REQUEST,
        ControlStatus::UnknownToken => StatusCode::NOT_FOUND,
        ControlStatus::DeliveryFailed => StatusCode::BAD_GATEWAY,
    }
}

fn reply(response: ControlResponse) -> ControlReply {
    (status_code(response.status), Json(response))
}

fn malformed(err: ProtocolError) -> ControlReply {
    debug!(error = %err, "Rejected malformed control request");
    reply(ControlResponse::failure(
        ControlStatus::MalformedRequest,
        err.to_string(),
    ))
}

fn registry_failure(err: RegistryError) -> ControlReply {
    let status = match err {
        RegistryError::NotFound(_) => ControlStatus::UnknownToken,
        RegistryError::WriteError { .. } | RegistryError::ReadLoopRunning(_) => {
            ControlStatus::DeliveryFailed
        }
    };
    reply(ControlResponse::failure(status, err.to_string()))
}
