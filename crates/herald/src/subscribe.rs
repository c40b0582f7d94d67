//! Subscriber side of the broker.
//!
//! A subscriber is nothing more than an open TCP connection: the daemon
//! writes notifications to it verbatim and closes it when the subscriber is
//! unsubscribed or the daemon shuts down.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::Result;

/// Connects to `addr` and copies everything the daemon sends into `out`.
///
/// Returns the number of bytes received once the daemon closes the
/// connection. `tokio::io::copy` flushes `out` whenever the socket has
/// nothing more to read, so each notification shows up as it arrives.
pub async fn subscribe<W>(addr: &str, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stream = TcpStream::connect(addr).await?;
    info!(addr, "Subscribed");

    let received = tokio::io::copy(&mut stream, out).await?;
    out.flush().await?;
    info!(bytes = received, "Daemon closed the subscription");
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_subscribe_streams_each_notification() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let daemon = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"first").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            stream.write_all(b"second").await.unwrap();
        });

        let mut out = Vec::new();
        let total = subscribe(&addr, &mut out).await.unwrap();
        daemon.await.unwrap();

        assert_eq!(out, b"firstsecond");
        assert_eq!(total, 11);
    }

    #[tokio::test]
    async fn test_subscribe_receives_farewell() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let daemon = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"server finished").await.unwrap();
        });

        let mut out = Vec::new();
        let total = subscribe(&addr, &mut out).await.unwrap();
        daemon.await.unwrap();

        assert_eq!(out, b"server finished");
        assert_eq!(total, 15);
    }

    #[tokio::test]
    async fn test_subscribe_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut out = Vec::new();
        let err = subscribe(&addr, &mut out).await.unwrap_err();
        assert!(matches!(err, crate::ClientError::Io(_)));
    }
}
