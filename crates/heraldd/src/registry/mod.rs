//! Subscriber registry: token issuance and connection lifecycle.
//!
//! The registry is the single owner of every live subscriber connection.
//! It hands out tokens, routes notifications to the right connection and
//! decides, for each subscriber, which of the competing close triggers
//! (peer disconnect, explicit unsubscribe, shutdown) actually performs the
//! teardown.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  register   ┌───────────────────────────────┐
//! │ Subscription    │────────────▶│       SubscriberRegistry      │
//! │ Server (TCP)    │             │                               │
//! └─────────────────┘             │  Mutex<{ HashMap<Token,Entry>,│
//!                                 │          TokenAllocator }>    │
//! ┌─────────────────┐  notify /   │                               │
//! │ Control Server  │────────────▶│  TaskTracker (read loops)     │
//! │ (HTTP)          │ unsubscribe └──────────────┬────────────────┘
//! └─────────────────┘                            │ spawn
//!                                                ▼
//!                                 ┌───────────────────────────────┐
//!                                 │  read loop (one per token)    │
//!                                 │  EOF / error ──▶ unsubscribe  │
//!                                 └───────────────────────────────┘
//! ```
//!
//! # Locking
//!
//! The map and the allocator share one `parking_lot::Mutex`. Critical
//! sections are single map operations; every write to or close of a
//! connection happens after the guard is dropped, so a stalled peer never
//! blocks unrelated registry operations.
//!
//! # Close arbitration
//!
//! Tearing a subscriber down starts by flipping its entry from `Active` to
//! `Closing` under the lock. Only the caller that performs that flip
//! continues; any concurrent trigger sees a non-active entry and gets
//! `RegistryError::NotFound`.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Failed writes are returned as `RegistryError::WriteError`, never raised
//! - Farewell writes during teardown are best-effort and only logged

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use herald_core::{SubscriberState, Token, TokenAllocator};

mod connection;
mod events;
mod read_loop;

pub use connection::{BoxedReader, BoxedWriter};
pub use events::{RegistryError, RegistryEvent, RemovalReason};
pub use read_loop::MAX_LINE_LENGTH;

use connection::{SubscriberConnection, WriteFailure};

/// Event channel buffer size
const EVENT_BUFFER: usize = 100;

// ============================================================================
// Subscriber Entry
// ============================================================================

/// One registered subscriber.
struct SubscriberEntry {
    state: SubscriberState,

    connection: Arc<SubscriberConnection>,

    /// Read half, taken by the read loop when it starts
    reader: Option<BoxedReader>,
}

struct RegistryState {
    entries: HashMap<Token, SubscriberEntry>,
    allocator: TokenAllocator,
}

struct Shared {
    state: Mutex<RegistryState>,
    read_loops: TaskTracker,
    events: broadcast::Sender<RegistryEvent>,
}

// ============================================================================
// Subscriber Registry
// ============================================================================

/// Registry of live subscriber connections.
///
/// Cheap to clone; every clone refers to the same registry.
///
/// # Usage
///
/// ```ignore
/// let registry = SubscriberRegistry::new();
///
/// let token = registry.register(stream);
/// registry.spawn_read_loop(token);
///
/// registry.notify(token, "hello").await?;
/// registry.unsubscribe(token, "bye").await?;
/// ```
#[derive(Clone)]
pub struct SubscriberRegistry {
    shared: Arc<Shared>,
}

impl SubscriberRegistry {
    /// Creates an empty registry whose first token is `0`.
    pub fn new() -> Self {
        Self::with_allocator(TokenAllocator::new())
    }

    /// Creates an empty registry that issues tokens from `allocator`.
    pub fn with_allocator(allocator: TokenAllocator) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState {
                    entries: HashMap::new(),
                    allocator,
                }),
                read_loops: TaskTracker::new(),
                events,
            }),
        }
    }

    /// Registers a duplex stream and returns its token.
    ///
    /// The stream is split; the write half stays with the registry and the
    /// read half waits for [`run_read_loop`](Self::run_read_loop). The token
    /// is visible to `notify`/`unsubscribe` as soon as this returns.
    pub fn register<S>(&self, stream: S) -> Token
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.register_split(reader, writer)
    }

    /// Registers a stream that has already been split into halves.
    pub fn register_split<R, W>(&self, reader: R, writer: W) -> Token
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (token, total) = {
            let mut state = self.shared.state.lock();
            let token = state.allocator.next();
            let entry = SubscriberEntry {
                state: SubscriberState::Active,
                connection: Arc::new(SubscriberConnection::new(token, Box::new(writer))),
                reader: Some(Box::new(reader)),
            };
            state.entries.insert(token, entry);
            (token, state.entries.len())
        };

        info!(token = %token, total_subscribers = total, "Subscriber registered");

        // Ignore if nobody is listening
        let _ = self.shared.events.send(RegistryEvent::Registered { token });

        token
    }

    /// Writes `message` verbatim to the subscriber holding `token`.
    ///
    /// A failed write is reported to the caller and leaves the subscriber
    /// registered; disconnecting it is up to the read loop or an explicit
    /// [`unsubscribe`](Self::unsubscribe).
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if no active subscriber holds `token`
    /// - `RegistryError::WriteError` if the write fails or times out
    pub async fn notify(
        &self,
        token: Token,
        message: impl AsRef<[u8]>,
    ) -> Result<(), RegistryError> {
        let connection = self.active_connection(token)?;
        let message = message.as_ref();

        match connection.write(message).await {
            Ok(()) => {
                debug!(token = %token, bytes = message.len(), "Notified subscriber");
                Ok(())
            }
            // Closed by a concurrent unsubscribe between lookup and write
            Err(WriteFailure::Closed) => Err(RegistryError::NotFound(token)),
            Err(e) => {
                warn!(token = %token, error = %e, "Failed to notify subscriber");
                Err(RegistryError::WriteError {
                    token,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Writes `farewell`, closes the connection and forgets the token.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if no active subscriber holds `token`,
    ///   including when another caller is already tearing it down. Nothing
    ///   is written or closed in that case.
    pub async fn unsubscribe(
        &self,
        token: Token,
        farewell: impl AsRef<[u8]>,
    ) -> Result<(), RegistryError> {
        self.remove(token, farewell.as_ref(), RemovalReason::Explicit)
            .await
    }

    /// Unsubscribes every current subscriber with the same farewell.
    ///
    /// Subscribers that disappear concurrently are skipped. Returns the
    /// number of subscribers this call closed.
    pub async fn unsubscribe_all(&self, farewell: impl AsRef<[u8]>) -> usize {
        let farewell = farewell.as_ref();
        let tokens = self.tokens();
        let mut closed = 0;

        for token in tokens {
            match self.remove(token, farewell, RemovalReason::Shutdown).await {
                Ok(()) => closed += 1,
                Err(e) => {
                    debug!(token = %token, error = %e, "Skipping subscriber during unsubscribe_all");
                }
            }
        }

        info!(closed, "Unsubscribed all subscribers");
        closed
    }

    /// Returns the number of active subscribers.
    pub fn len(&self) -> usize {
        self.shared
            .state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.state.is_active())
            .count()
    }

    /// Returns true if no subscriber is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `token` names an active subscriber.
    pub fn contains(&self, token: Token) -> bool {
        self.shared
            .state
            .lock()
            .entries
            .get(&token)
            .is_some_and(|entry| entry.state.is_active())
    }

    /// Snapshot of the active tokens, in ascending order.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self
            .shared
            .state
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.state.is_active())
            .map(|(token, _)| *token)
            .collect();
        tokens.sort_unstable();
        tokens
    }

    /// Subscribe to registry lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }

    /// Number of read loops that have not finished yet.
    pub fn read_loop_count(&self) -> usize {
        self.shared.read_loops.len()
    }

    /// Waits up to `timeout` for every spawned read loop to finish.
    ///
    /// Returns `true` if they all finished in time.
    pub async fn wait_for_read_loops(&self, timeout: Duration) -> bool {
        self.shared.read_loops.close();
        let finished = tokio::time::timeout(timeout, self.shared.read_loops.wait())
            .await
            .is_ok();
        self.shared.read_loops.reopen();
        finished
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn active_connection(&self, token: Token) -> Result<Arc<SubscriberConnection>, RegistryError> {
        self.shared
            .state
            .lock()
            .entries
            .get(&token)
            .filter(|entry| entry.state.is_active())
            .map(|entry| Arc::clone(&entry.connection))
            .ok_or(RegistryError::NotFound(token))
    }

    /// Hands the read half to a starting read loop.
    fn take_reader(&self, token: Token) -> Result<(BoxedReader, CancellationToken), RegistryError> {
        let mut state = self.shared.state.lock();
        let entry = state
            .entries
            .get_mut(&token)
            .filter(|entry| entry.state.is_active())
            .ok_or(RegistryError::NotFound(token))?;

        let reader = entry
            .reader
            .take()
            .ok_or(RegistryError::ReadLoopRunning(token))?;

        Ok((reader, entry.connection.closed_token()))
    }

    /// Shared teardown path for every close trigger.
    async fn remove(
        &self,
        token: Token,
        farewell: &[u8],
        reason: RemovalReason,
    ) -> Result<(), RegistryError> {
        // Active -> Closing: the single arbitration point
        let connection = {
            let mut state = self.shared.state.lock();
            let entry = state
                .entries
                .get_mut(&token)
                .ok_or(RegistryError::NotFound(token))?;

            entry.state = entry
                .state
                .transition(SubscriberState::Closing)
                .map_err(|_| RegistryError::NotFound(token))?;

            Arc::clone(&entry.connection)
        };

        info!(token = %token, reason = %reason, "Unsubscribing subscriber");

        if let Err(e) = connection.write(farewell).await {
            debug!(token = %token, error = %e, "Failed to deliver farewell message");
        }

        connection.close().await;

        // Closing -> Closed
        let removed = self.shared.state.lock().entries.remove(&token);
        if let Some(entry) = removed {
            if let Err(e) = entry.state.transition(SubscriberState::Closed) {
                warn!(token = %token, error = %e, "Unexpected subscriber state on removal");
            }
        }

        let _ = self
            .shared
            .events
            .send(RegistryEvent::Removed { token, reason });

        Ok(())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
