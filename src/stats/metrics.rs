//! Statistics for shared streams

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Entry of the `/api/status` document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    /// Attached listeners
    pub clients: usize,
    /// Whether the upstream transcoder is live
    pub running: bool,
}

/// Live counters updated by a stream's tasks
#[derive(Debug)]
pub struct StreamCounters {
    started_at: Instant,
    bytes_received: AtomicU64,
    chunks_queued: AtomicU64,
    chunks_delivered: AtomicU64,
    write_failures: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_received: AtomicU64::new(0),
            chunks_queued: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Bytes read from the transcoder
    pub fn record_read(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Chunk handed to the broadcast queue
    pub fn record_queued(&self) {
        self.chunks_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Chunk written to one listener
    pub fn record_delivered(&self) {
        self.chunks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Listener removed after a failed write
    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self, clients: usize, chunks_dropped: u64) -> StreamStats {
        StreamStats {
            clients,
            uptime: self.started_at.elapsed(),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chunks_queued: self.chunks_queued.load(Ordering::Relaxed),
            chunks_dropped,
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StreamCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream-level statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Attached listeners
    pub clients: usize,
    /// Time since the stream started
    pub uptime: Duration,
    /// Total bytes read from the transcoder
    pub bytes_received: u64,
    /// Chunks pushed to the broadcast queue
    pub chunks_queued: u64,
    /// Chunks evicted by queue overflow
    pub chunks_dropped: u64,
    /// Chunk writes across all listeners
    pub chunks_delivered: u64,
    /// Listeners removed after a failed write
    pub write_failures: u64,
}

impl StreamStats {
    /// Upstream bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}
