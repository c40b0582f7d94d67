//! Wiring of registry, servers and shutdown into one running daemon.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::registry::SubscriberRegistry;
use crate::server::{ControlServer, ServerError, SubscriptionServer};
use crate::shutdown::{DrainReport, ShutdownCoordinator};

/// A configured, not yet running daemon.
///
/// ```ignore
/// let daemon = Daemon::new(Config::load(None)?);
/// let stop = daemon.cancel_token();
/// tokio::spawn(async move {
///     let _ = wait_for_shutdown_signal().await;
///     stop.cancel();
/// });
/// daemon.run().await?;
/// ```
pub struct Daemon {
    config: Config,
    registry: SubscriberRegistry,
    coordinator: ShutdownCoordinator,
}

impl Daemon {
    /// Creates a daemon with an empty registry.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: SubscriberRegistry::new(),
            coordinator: ShutdownCoordinator::new(),
        }
    }

    /// Handle to the daemon's registry.
    pub fn registry(&self) -> SubscriberRegistry {
        self.registry.clone()
    }

    /// Cancelling this token stops the daemon.
    pub fn cancel_token(&self) -> CancellationToken {
        self.coordinator.token()
    }

    /// Binds both listeners from the configuration and runs until cancelled.
    ///
    /// A subscription listener that cannot bind is logged and the daemon
    /// keeps serving its control endpoint. A control endpoint that cannot
    /// bind is fatal.
    ///
    /// # Errors
    ///
    /// Returns the control server's error, after draining the registry.
    pub async fn run(self) -> Result<DrainReport, ServerError> {
        let subscription_addr = self.config.subscription_addr();
        let subscription = match TcpListener::bind(subscription_addr).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                error!(
                    error = %ServerError::bind(subscription_addr, e),
                    "Subscription listener unavailable, continuing without it"
                );
                None
            }
        };

        let control_addr = self.config.control_addr();
        match TcpListener::bind(control_addr).await {
            Ok(control) => self.serve(control, subscription).await,
            Err(e) => {
                let err = ServerError::bind(control_addr, e);
                error!(error = %err, "Control endpoint unavailable");
                self.drain().await;
                Err(err)
            }
        }
    }

    /// Runs on already bound listeners until cancelled, then drains.
    pub async fn serve(
        self,
        control: TcpListener,
        subscription: Option<TcpListener>,
    ) -> Result<DrainReport, ServerError> {
        let token = self.coordinator.token();

        let subscription_task = subscription.map(|listener| {
            let server = SubscriptionServer::new(
                self.registry.clone(),
                self.config.max_subscribers,
                token.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = server.serve(listener).await {
                    error!(error = %e, "Subscription server failed");
                }
            })
        });

        let control_server = ControlServer::new(self.registry.clone(), token);
        let result = control_server.serve(control).await;
        if let Err(ref e) = result {
            error!(error = %e, "Control server failed");
        }

        // Stop accepting before the drain snapshots the registry
        self.coordinator.shutdown();
        if let Some(task) = subscription_task {
            if let Err(e) = task.await {
                error!(error = %e, "Subscription server task panicked");
            }
        }

        let report = self.drain().await;

        info!(
            closed = report.closed,
            read_loops_finished = report.read_loops_finished,
            "Daemon stopped"
        );

        result.map(|()| report)
    }

    async fn drain(&self) -> DrainReport {
        self.coordinator
            .drain(
                &self.registry,
                &self.config.shutdown_message,
                self.config.shutdown_timeout(),
            )
            .await
    }
}
