//! Shared stream lifecycle
//!
//! A [`SharedStream`] owns one transcoder process and fans its output out to
//! every attached listener. Per stream there is:
//!
//! - a producer task reading the transcoder output into the broadcast queue
//! - a broadcaster task writing each queued chunk to every session
//! - a log task forwarding transcoder diagnostics to `tracing`
//! - at most one grace timer, armed when the last listener leaves
//!
//! ```text
//!   Starting ──launch()──► Running ──EOF / read error / grace expiry / stop()──► Stopped
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::media::{FrameAligner, StreamProfile};
use crate::session::ClientSession;
use crate::stats::{StreamCounters, StreamStats, StreamStatus};
use crate::upstream::{ByteSource, ProcessHandle, TranscoderProcess};

use super::config::RegistryConfig;
use super::queue::BroadcastQueue;
use super::station::StationId;

/// Invoked once when a stream stops, with the stream's instance id
pub type StopCallback = Box<dyn FnOnce(u64) -> BoxFuture<'static, ()> + Send>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Lifecycle phase of a shared stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Resolving upstream data and starting the transcoder
    Starting,
    /// Transcoder output is being relayed
    Running,
    /// Terminal
    Stopped,
}

struct GraceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct StreamInner {
    phase: StreamPhase,
    clients: HashMap<String, Arc<ClientSession>>,
    // Guarded together with `clients` so arm and cancel can't race
    grace: Option<GraceTimer>,
    grace_generation: u64,
}

/// How the producer loop ended
#[derive(Debug)]
pub(crate) enum PumpEnd {
    Eof,
    Cancelled,
    Failed(std::io::Error),
}

/// One live upstream decode session, shared by all listeners of a station
pub struct SharedStream {
    station: StationId,
    profile: StreamProfile,
    instance: u64,
    grace_period: Duration,
    read_buffer_size: usize,
    inner: RwLock<StreamInner>,
    queue: BroadcastQueue,
    cancel: CancellationToken,
    process: tokio::sync::Mutex<Option<Box<dyn ProcessHandle>>>,
    on_stop: Mutex<Option<StopCallback>>,
    counters: StreamCounters,
}

impl SharedStream {
    /// Create a stream in the `Starting` phase
    pub fn new(station: StationId, profile: StreamProfile, config: &RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            station,
            profile,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            grace_period: config.grace_period,
            read_buffer_size: config.read_buffer_size.max(1),
            inner: RwLock::new(StreamInner {
                phase: StreamPhase::Starting,
                clients: HashMap::new(),
                grace: None,
                grace_generation: 0,
            }),
            queue: BroadcastQueue::new(profile.queue_capacity()),
            cancel: CancellationToken::new(),
            process: tokio::sync::Mutex::new(None),
            on_stop: Mutex::new(None),
            counters: StreamCounters::new(),
        })
    }

    /// Register the callback run when the stream stops
    pub fn set_on_stop(&self, callback: StopCallback) {
        *self.on_stop.lock() = Some(callback);
    }

    /// Take ownership of a started transcoder and begin relaying
    pub async fn launch(self: &Arc<Self>, process: TranscoderProcess) {
        let TranscoderProcess {
            output,
            diagnostics,
            mut handle,
        } = process;

        let starting = {
            let mut inner = self.inner.write();
            let starting = inner.phase == StreamPhase::Starting;
            if starting {
                inner.phase = StreamPhase::Running;
            }
            starting
        };
        if !starting {
            if let Err(e) = handle.stop().await {
                tracing::warn!(station = %self.station, error = %e, "Failed to stop transcoder");
            }
            return;
        }
        *self.process.lock().await = Some(handle);

        if let Some(diagnostics) = diagnostics {
            tokio::spawn(drain_diagnostics(
                self.station.clone(),
                self.profile,
                diagnostics,
            ));
        }
        tokio::spawn(Arc::clone(self).produce(output));
        tokio::spawn(Arc::clone(self).broadcast());

        tracing::info!(
            station = %self.station,
            profile = %self.profile,
            instance = self.instance,
            "Stream started"
        );
    }

    /// Attach a listener and wait until it is gone
    ///
    /// Returns when `cancel` fires (listener disconnected) or the session's
    /// done signal fires (write failure, stream stopped). The session is
    /// removed either way; the last removal arms the grace period.
    pub async fn add_client(self: &Arc<Self>, session: Arc<ClientSession>, cancel: CancellationToken) {
        if !self.attach(Arc::clone(&session)) {
            session.close();
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = session.closed() => {}
        }

        self.remove_client(session.id());
    }

    fn attach(self: &Arc<Self>, session: Arc<ClientSession>) -> bool {
        let mut inner = self.inner.write();
        if inner.phase == StreamPhase::Stopped {
            return false;
        }
        if let Some(timer) = inner.grace.take() {
            timer.handle.abort();
            tracing::info!(station = %self.station, profile = %self.profile, "Grace period cancelled");
        }
        let client_id = session.id().to_string();
        inner.clients.insert(client_id.clone(), session);
        tracing::info!(
            station = %self.station,
            profile = %self.profile,
            client_id = %client_id,
            clients = inner.clients.len(),
            "Client added"
        );
        true
    }

    /// Detach a listener; no-op if it is already gone
    pub fn remove_client(self: &Arc<Self>, client_id: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.clients.remove(client_id).is_none() {
            return false;
        }

        let remaining = inner.clients.len();
        tracing::info!(
            station = %self.station,
            profile = %self.profile,
            client_id = %client_id,
            clients = remaining,
            "Client removed"
        );

        if remaining == 0 && inner.phase == StreamPhase::Running {
            self.arm_grace(&mut inner);
        }
        true
    }

    /// Cancel a pending grace timer
    ///
    /// Returns whether one was pending.
    pub fn cancel_grace(&self) -> bool {
        let timer = self.inner.write().grace.take();
        match timer {
            Some(timer) => {
                timer.handle.abort();
                tracing::info!(station = %self.station, profile = %self.profile, "Grace period cancelled");
                true
            }
            None => false,
        }
    }

    fn arm_grace(self: &Arc<Self>, inner: &mut StreamInner) {
        if inner.grace.is_some() {
            return;
        }

        inner.grace_generation += 1;
        let generation = inner.grace_generation;
        let period = self.grace_period;
        let stream = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if let Some(stream) = stream.upgrade() {
                stream.grace_expired(generation).await;
            }
        });
        inner.grace = Some(GraceTimer { generation, handle });

        tracing::info!(
            station = %self.station,
            profile = %self.profile,
            grace_secs = period.as_secs_f64(),
            "No clients left, grace period started"
        );
    }

    async fn grace_expired(&self, generation: u64) {
        let sessions = {
            let mut inner = self.inner.write();
            match &inner.grace {
                Some(timer) if timer.generation == generation => {}
                // Cancelled or superseded
                _ => return,
            }
            inner.grace = None;
            if !inner.clients.is_empty() || inner.phase != StreamPhase::Running {
                return;
            }
            // Decided under the same lock a new subscriber would take
            Self::mark_stopped(&mut inner)
        };

        if let Some(sessions) = sessions {
            tracing::info!(station = %self.station, profile = %self.profile, "Grace period expired, stopping stream");
            self.finish_stop(sessions).await;
        }
    }

    /// Transition to `Stopped`
    ///
    /// Closes every attached session, closes the queue, stops the
    /// transcoder and runs the stop callback. Idempotent.
    pub async fn stop(&self) {
        let sessions = Self::mark_stopped(&mut self.inner.write());
        if let Some(sessions) = sessions {
            self.finish_stop(sessions).await;
        }
    }

    fn mark_stopped(inner: &mut StreamInner) -> Option<Vec<Arc<ClientSession>>> {
        if inner.phase == StreamPhase::Stopped {
            return None;
        }
        inner.phase = StreamPhase::Stopped;
        if let Some(timer) = inner.grace.take() {
            timer.handle.abort();
        }
        Some(inner.clients.drain().map(|(_, session)| session).collect())
    }

    async fn finish_stop(&self, sessions: Vec<Arc<ClientSession>>) {
        for session in &sessions {
            session.close();
        }
        drop(sessions);

        self.queue.close();
        self.cancel.cancel();

        let handle = self.process.lock().await.take();
        if let Some(mut handle) = handle {
            if let Err(e) = handle.stop().await {
                tracing::warn!(station = %self.station, error = %e, "Failed to stop transcoder");
            }
        }

        let callback = self.on_stop.lock().take();
        if let Some(callback) = callback {
            callback(self.instance).await;
        }

        let stats = self.stats();
        tracing::info!(
            station = %self.station,
            profile = %self.profile,
            instance = self.instance,
            uptime_secs = stats.uptime.as_secs(),
            bytes = stats.bytes_received,
            bitrate = stats.bitrate(),
            queued = stats.chunks_queued,
            dropped = stats.chunks_dropped,
            delivered = stats.chunks_delivered,
            write_failures = stats.write_failures,
            "Stream stopped"
        );
    }

    async fn produce(self: Arc<Self>, mut output: ByteSource) {
        let mut aligner = FrameAligner::new(self.profile.frame_size());

        let end = pump(
            &mut output,
            &mut aligner,
            self.read_buffer_size,
            &self.cancel,
            &self.queue,
            &self.counters,
            &self.station,
        )
        .await;

        match end {
            PumpEnd::Eof => {
                tracing::info!(station = %self.station, profile = %self.profile, "Transcoder output ended")
            }
            PumpEnd::Failed(e) => {
                tracing::error!(station = %self.station, profile = %self.profile, error = %e, "Transcoder read failed")
            }
            PumpEnd::Cancelled => return,
        }

        self.stop().await;
    }

    async fn broadcast(self: Arc<Self>) {
        while let Some(chunk) = self.queue.pop().await {
            let sessions: Vec<Arc<ClientSession>> =
                self.inner.read().clients.values().cloned().collect();

            for session in sessions {
                if session.is_closed() {
                    continue;
                }
                match session.send(chunk.clone()).await {
                    Ok(()) => self.counters.record_delivered(),
                    Err(e) => {
                        tracing::debug!(
                            station = %self.station,
                            client_id = %session.id(),
                            error = %e,
                            "Client write failed"
                        );
                        self.counters.record_write_failure();
                        session.close();
                        self.remove_client(session.id());
                    }
                }
            }
        }

        tracing::debug!(station = %self.station, profile = %self.profile, "Broadcaster finished");
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    pub fn profile(&self) -> StreamProfile {
        self.profile
    }

    /// Identifies this instance among streams of the same station over time
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn phase(&self) -> StreamPhase {
        self.inner.read().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == StreamPhase::Running
    }

    pub fn client_count(&self) -> usize {
        self.inner.read().clients.len()
    }

    /// Whether a grace timer is pending
    pub fn grace_pending(&self) -> bool {
        self.inner.read().grace.is_some()
    }

    pub fn status(&self) -> StreamStatus {
        let inner = self.inner.read();
        StreamStatus {
            clients: inner.clients.len(),
            running: inner.phase == StreamPhase::Running,
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.counters
            .snapshot(self.client_count(), self.queue.dropped())
    }
}

impl std::fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("station", &self.station)
            .field("profile", &self.profile)
            .field("instance", &self.instance)
            .field("phase", &self.phase())
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Read `output` into `queue` until EOF, error or cancellation
///
/// Every queued chunk is frame-aligned; leftover bytes wait in `aligner`
/// for the next read.
pub(crate) async fn pump<R>(
    output: &mut R,
    aligner: &mut FrameAligner,
    read_size: usize,
    cancel: &CancellationToken,
    queue: &BroadcastQueue,
    counters: &StreamCounters,
    station: &StationId,
) -> PumpEnd
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; read_size.max(1)];
    let mut first_data = true;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
            read = output.read(&mut buf) => read,
        };

        match read {
            Ok(0) => return PumpEnd::Eof,
            Ok(n) => {
                if first_data {
                    first_data = false;
                    tracing::info!(station = %station, bytes = n, "First data received from transcoder");
                }
                counters.record_read(n);

                if let Some(chunk) = aligner.push(&buf[..n]) {
                    tracing::trace!(station = %station, len = chunk.len(), "Chunk queued");
                    if queue.push(chunk) {
                        counters.record_queued();
                    }
                }
            }
            Err(e) => return PumpEnd::Failed(e),
        }
    }
}

/// Forward transcoder diagnostics to the log until EOF
///
/// Lines are raw bytes; anything that is not UTF-8 is logged lossily. The
/// pipe stays open until the transcoder closes it, since dropping the
/// read end would make the transcoder's next write fail.
///
/// Returns the number of non-empty lines logged.
async fn drain_diagnostics<R>(station: StationId, profile: StreamProfile, source: R) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    let mut logged = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim();
                if !text.is_empty() {
                    logged += 1;
                    tracing::warn!(station = %station, profile = %profile, "transcoder: {}", text);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(station = %station, error = %e, "Transcoder log closed");
                break;
            }
        }
    }
    logged
}
