//! Per-listener session

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::sink::{ClientSink, SinkError};

static LAST_CLIENT_NANOS: AtomicU64 = AtomicU64::new(0);

/// Build a unique client id of the form `<ip>-<nanos>`
///
/// The timestamp part is strictly increasing across calls, so two listeners
/// behind the same address never collide.
pub fn client_id(ip: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let mut last = LAST_CLIENT_NANOS.load(Ordering::Relaxed);
    let nanos = loop {
        let next = now.max(last + 1);
        match LAST_CLIENT_NANOS.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break next,
            Err(current) => last = current,
        }
    };

    format!("{}-{}", ip, nanos)
}

/// A listener attached to a shared stream
///
/// Holds the output sink and a done signal. The signal fires when the
/// session fails a write, when the stream stops, or when [`close`] is
/// called; it never resets.
///
/// [`close`]: ClientSession::close
pub struct ClientSession {
    id: String,
    sink: Box<dyn ClientSink>,
    done: CancellationToken,
}

impl ClientSession {
    pub fn new(id: impl Into<String>, sink: impl ClientSink + 'static) -> Self {
        Self {
            id: id.into(),
            sink: Box::new(sink),
            done: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Write a chunk to the sink
    pub async fn send(&self, chunk: Bytes) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.sink.send(chunk).await
    }

    /// Fire the done signal
    pub fn close(&self) {
        self.done.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Wait for the done signal
    pub async fn closed(&self) {
        self.done.cancelled().await
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
