//! Per-subscriber read loop.
//!
//! Subscribers never send anything the daemon acts on. The loop reads
//! newline-delimited frames as raw bytes only to notice when the connection
//! ends; frames are never decoded, so binary payloads are fine. It then
//! asks the registry to unsubscribe the token with the error description as
//! farewell. If the registry already closed the connection (explicit
//! unsubscribe or shutdown), the loop's own unsubscribe loses the race,
//! gets `NotFound`, and the loop exits quietly.
//!
//! A frame longer than [`MAX_LINE_LENGTH`] without a newline is treated like
//! a read error: the subscriber is disconnected rather than buffered without
//! bound.

use futures::StreamExt;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{debug, info, trace, warn};

use herald_core::Token;

use super::{RegistryError, RemovalReason, SubscriberRegistry};

/// Frame delimiter of inbound subscriber data
const LINE_DELIMITER: &[u8] = b"\n";

/// Maximum length of a single inbound line (1 MB)
pub const MAX_LINE_LENGTH: usize = 1_048_576;

/// Farewell/reason used when the peer closes cleanly
const EOF_REASON: &str = "EOF";

/// Reason recorded when the registry closed the connection from under the loop
const CLOSED_REASON: &str = "connection closed";

impl SubscriberRegistry {
    /// Spawns the read loop for `token` as a tracked task.
    ///
    /// The task is counted by [`read_loop_count`](Self::read_loop_count) and
    /// awaited by [`wait_for_read_loops`](Self::wait_for_read_loops).
    pub fn spawn_read_loop(&self, token: Token) {
        let registry = self.clone();

        self.shared.read_loops.spawn(async move {
            if let Err(e) = registry.run_read_loop(token).await {
                debug!(token = %token, error = %e, "Read loop did not start");
            }
        });
    }

    /// Reads from the subscriber until EOF or a read error, then
    /// unsubscribes it.
    ///
    /// Runs until the connection ends. Performs no retries: the first read
    /// error is terminal.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if `token` is not an active subscriber
    /// - `RegistryError::ReadLoopRunning` if a loop already owns the read half
    pub async fn run_read_loop(&self, token: Token) -> Result<(), RegistryError> {
        let (reader, closed) = self.take_reader(token)?;
        let codec = AnyDelimiterCodec::new_with_max_length(
            LINE_DELIMITER.to_vec(),
            Vec::new(),
            MAX_LINE_LENGTH,
        );
        let mut frames = FramedRead::new(reader, codec);

        debug!(token = %token, "Read loop started");

        let reason = loop {
            tokio::select! {
                _ = closed.cancelled() => {
                    break CLOSED_REASON.to_string();
                }

                frame = frames.next() => {
                    match frame {
                        Some(Ok(line)) => {
                            trace!(token = %token, bytes = line.len(), "Ignoring subscriber payload");
                        }
                        Some(Err(e)) => break e.to_string(),
                        None => break EOF_REASON.to_string(),
                    }
                }
            }
        };

        // Release the read half before teardown so the socket can fully close
        drop(frames);

        match self
            .remove(token, reason.as_bytes(), RemovalReason::PeerDisconnected)
            .await
        {
            Ok(()) => {
                info!(token = %token, reason = %reason, "Subscriber disconnected");
            }
            Err(e) if e.is_not_found() => {
                debug!(token = %token, "Read loop exiting, subscriber already unsubscribed");
            }
            Err(e) => {
                warn!(token = %token, error = %e, "Read loop failed to unsubscribe subscriber");
            }
        }

        Ok(())
    }
}
