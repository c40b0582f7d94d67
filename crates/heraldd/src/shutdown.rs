//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::SubscriberRegistry;

/// What a drain accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Subscribers closed by the drain itself
    pub closed: usize,

    /// Whether every read loop finished within the timeout
    pub read_loops_finished: bool,
}

/// Coordinates shutdown across the listener, control server and registry.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the servers and closes every subscriber.
    ///
    /// 1. Cancel the token (servers stop accepting)
    /// 2. Unsubscribe every subscriber with `farewell`
    /// 3. Wait up to `timeout` for the read loops to exit
    pub async fn drain(
        &self,
        registry: &SubscriberRegistry,
        farewell: &str,
        timeout: Duration,
    ) -> DrainReport {
        self.shutdown();

        let closed = registry.unsubscribe_all(farewell).await;

        info!(
            closed,
            read_loops = registry.read_loop_count(),
            timeout_secs = timeout.as_secs(),
            "Waiting for read loops to finish"
        );

        let read_loops_finished = registry.wait_for_read_loops(timeout).await;
        if !read_loops_finished {
            warn!(
                remaining = registry.read_loop_count(),
                "Shutdown timed out after {timeout:?}, some read loops are still running"
            );
        }

        DrainReport {
            closed,
            read_loops_finished,
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when the process receives SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn multiple_shutdown_calls_idempotent() {
        let coord = ShutdownCoordinator::default();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_closes_subscribers_and_read_loops() {
        let coord = ShutdownCoordinator::new();
        let registry = SubscriberRegistry::new();

        let mut clients = Vec::new();
        for _ in 0..3 {
            let (server, client) = tokio::io::duplex(1024);
            let token = registry.register(server);
            registry.spawn_read_loop(token);
            clients.push(client);
        }

        let report = coord
            .drain(&registry, "server finished", Duration::from_secs(2))
            .await;

        assert_eq!(
            report,
            DrainReport {
                closed: 3,
                read_loops_finished: true
            }
        );
        assert!(coord.is_shutting_down());
        assert!(registry.is_empty());

        for mut client in clients {
            let mut received = String::new();
            client.read_to_string(&mut received).await.unwrap();
            assert_eq!(received, "server finished");
        }
    }

    #[tokio::test]
    async fn drain_empty_registry() {
        let coord = ShutdownCoordinator::new();
        let report = coord
            .drain(&SubscriberRegistry::new(), "bye", Duration::from_millis(100))
            .await;
        assert_eq!(report.closed, 0);
        assert!(report.read_loops_finished);
    }
}
