//! Network front-ends of the herald daemon.
//!
//! - `SubscriptionServer` accepts subscriber TCP connections, registers them
//!   and starts their read loops
//! - `ControlServer` serves the HTTP control endpoint (`/notify`,
//!   `/unsubscribe`, `/health`)
//!
//! Both stop accepting when their `CancellationToken` is cancelled.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐          ┌────────────────────┐
//! │ SubscriptionServer │          │   ControlServer    │
//! │   TcpListener      │          │   axum Router      │
//! └─────────┬──────────┘          └─────────┬──────────┘
//!           │ register +                    │ notify /
//!           │ spawn_read_loop               │ unsubscribe
//!           ▼                               ▼
//!        ┌─────────────────────────────────────────┐
//!        │           SubscriberRegistry            │
//!        └─────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the accept loop continues

mod control;

pub use control::{router, ControlServer};

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::SubscriberRegistry;

/// Written to peers turned away because the subscriber limit is reached
pub const SUBSCRIBER_LIMIT_MESSAGE: &str = "subscriber limit reached\n";

// ============================================================================
// Subscription Server
// ============================================================================

/// TCP listener for subscriber connections.
///
/// Every accepted peer is registered and handed to its read loop; no
/// handshake is exchanged. The subscriber limit is checked here, before
/// `register`, since the registry itself never refuses a connection.
pub struct SubscriptionServer {
    /// Registry that owns accepted connections
    registry: SubscriberRegistry,

    /// Advisory upper bound on concurrent subscribers
    max_subscribers: usize,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl SubscriptionServer {
    /// Creates a new subscription server.
    ///
    /// # Arguments
    ///
    /// * `registry` - Registry that will own accepted connections
    /// * `max_subscribers` - Peers beyond this many are turned away
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        registry: SubscriberRegistry,
        max_subscribers: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            max_subscribers,
            cancel_token,
        }
    }

    /// Binds `addr` and accepts connections until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;

        self.serve(listener).await
    }

    /// Accepts connections on an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        match listener.local_addr() {
            Ok(addr) => info!(address = %addr, "Subscription server listening"),
            Err(e) => warn!(error = %e, "Subscription server listening on unknown address"),
        }

        loop {
            tokio::select! {
                // Once cancelled, pending connections are never registered
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Subscription server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.handle_connection(stream, peer).await,
                        Err(e) => {
                            error!(error = %e, "Failed to accept subscriber connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Registers an accepted connection and starts its read loop.
    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let active = self.registry.len();
        if active >= self.max_subscribers {
            warn!(
                peer = %peer,
                active,
                max = self.max_subscribers,
                "Subscriber limit reached, rejecting connection"
            );
            if let Err(e) = stream.write_all(SUBSCRIBER_LIMIT_MESSAGE.as_bytes()).await {
                debug!(peer = %peer, error = %e, "Failed to notify rejected peer");
            }
            return;
        }

        let (reader, writer) = stream.into_split();
        let token = self.registry.register_split(reader, writer);
        debug!(token = %token, peer = %peer, "Accepted subscriber");

        self.registry.spawn_read_loop(token);
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub(crate) fn bind(addr: SocketAddr, error: std::io::Error) -> Self {
        Self::Bind {
            addr,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::bind(
            "127.0.0.1:3000".parse().unwrap(),
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );
        assert!(err.to_string().contains("127.0.0.1:3000"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_limit_message_is_newline_terminated() {
        assert!(SUBSCRIBER_LIMIT_MESSAGE.ends_with('\n'));
    }
}
