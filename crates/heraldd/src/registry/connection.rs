//! Write side of a subscriber connection.
//!
//! The registry keeps one `SubscriberConnection` per entry. It owns the
//! write half of the stream and the cancellation token that ends the
//! subscriber's read loop. Closing is idempotent: the writer is taken out
//! of its slot exactly once, later calls find the slot empty.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use herald_core::Token;

/// Read half handed to a subscriber's read loop.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half kept by the registry.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a write to a subscriber did not go through.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WriteFailure {
    #[error("connection already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("write timeout")]
    Timeout,
}

pub(crate) struct SubscriberConnection {
    token: Token,

    /// `None` once the connection has been closed
    writer: Mutex<Option<BoxedWriter>>,

    /// Cancelled when the registry closes the connection
    closed: CancellationToken,
}

impl SubscriberConnection {
    pub(crate) fn new(token: Token, writer: BoxedWriter) -> Self {
        Self {
            token,
            writer: Mutex::new(Some(writer)),
            closed: CancellationToken::new(),
        }
    }

    /// Token that fires once [`close`](Self::close) has run.
    pub(crate) fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Writes `bytes` verbatim and flushes.
    pub(crate) async fn write(&self, bytes: &[u8]) -> Result<(), WriteFailure> {
        let mut slot = self.writer.lock().await;
        let writer = slot.as_mut().ok_or(WriteFailure::Closed)?;

        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(bytes).await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WriteFailure::Io(e.to_string())),
            Err(_) => Err(WriteFailure::Timeout),
        }
    }

    /// Shuts the write half down and stops the read loop.
    ///
    /// Returns `true` if this call closed the connection, `false` if it was
    /// already closed.
    pub(crate) async fn close(&self) -> bool {
        let writer = self.writer.lock().await.take();

        let Some(mut writer) = writer else {
            return false;
        };

        match timeout(WRITE_TIMEOUT, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(token = %self.token, error = %e, "Error shutting down subscriber connection");
            }
            Err(_) => {
                debug!(token = %self.token, "Timed out shutting down subscriber connection");
            }
        }
        drop(writer);

        self.closed.cancel();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_is_verbatim() {
        let (server, mut client) = tokio::io::duplex(64);
        let conn = SubscriberConnection::new(Token::new(0), Box::new(server));

        conn.write(b"hello").await.unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (server, _client) = tokio::io::duplex(64);
        let conn = SubscriberConnection::new(Token::new(1), Box::new(server));

        assert!(conn.close().await);
        assert!(!conn.close().await);
        assert!(conn.closed_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_write_after_close_reports_closed() {
        let (server, _client) = tokio::io::duplex(64);
        let conn = SubscriberConnection::new(Token::new(2), Box::new(server));

        conn.close().await;
        assert!(matches!(conn.write(b"late").await, Err(WriteFailure::Closed)));
    }

    #[tokio::test]
    async fn test_write_to_dropped_peer_is_io_error() {
        let (server, client) = tokio::io::duplex(64);
        let conn = SubscriberConnection::new(Token::new(3), Box::new(server));
        drop(client);

        assert!(matches!(conn.write(b"gone").await, Err(WriteFailure::Io(_))));
    }

    #[tokio::test]
    async fn test_peer_sees_eof_after_close() {
        let (server, mut client) = tokio::io::duplex(64);
        let conn = SubscriberConnection::new(Token::new(4), Box::new(server));

        conn.write(b"bye").await.unwrap();
        conn.close().await;

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");
    }
}
