//! Output sinks for client sessions

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Error returned when a chunk can no longer be delivered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The listener went away
    #[error("client sink closed")]
    Closed,
}

/// Where a session's audio goes
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Deliver one chunk
    ///
    /// Any error permanently removes the session from its stream.
    async fn send(&self, chunk: Bytes) -> Result<(), SinkError>;
}

/// Sink feeding a bounded channel (drained by the HTTP response body)
///
/// A full channel means the listener is behind; the chunk is skipped for
/// this listener only and delivery carries on with the next one.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver its chunks arrive on
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ClientSink for ChannelSink {
    async fn send(&self, chunk: Bytes) -> Result<(), SinkError> {
        match self.tx.try_send(chunk) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::trace!("Client buffer full, chunk skipped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.send(Bytes::from_static(b"a")).await.unwrap();
        sink.send(Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_full_buffer_skips_without_error() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.send(Bytes::from_static(b"kept")).await.unwrap();
        sink.send(Bytes::from_static(b"skipped")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"kept"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_an_error() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);

        assert_eq!(
            sink.send(Bytes::from_static(b"x")).await,
            Err(SinkError::Closed)
        );
    }
}
