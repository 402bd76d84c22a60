//! In-memory collaborators for tests
//!
//! [`MockTranscoder`] hands out in-memory pipes instead of spawning a
//! process. Each started "process" gets a [`MockFeed`] the test writes
//! upstream bytes into; stopping the process (or calling
//! [`MockFeed::close`]) ends the output with a clean EOF.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, DuplexStream};

use super::directory::{DirectoryError, StationDirectory};
use super::transcoder::{ProcessHandle, TranscodeRequest, Transcoder, TranscoderProcess};
use crate::registry::StationId;

/// Directory with canned answers and call counters
#[derive(Debug)]
pub struct MockDirectory {
    token: Mutex<String>,
    endpoints: Mutex<Vec<String>>,
    unknown: Mutex<Vec<String>>,
    auth_delay: Mutex<Duration>,
    area_calls: AtomicUsize,
    auth_calls: AtomicUsize,
    endpoint_calls: AtomicUsize,
    session_ids: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            token: Mutex::new("mock-token".to_string()),
            endpoints: Mutex::new(vec![
                "https://primary.invalid/playlist.m3u8".to_string(),
                "https://preferred.invalid/playlist.m3u8".to_string(),
            ]),
            unknown: Mutex::new(Vec::new()),
            auth_delay: Mutex::new(Duration::ZERO),
            area_calls: AtomicUsize::new(0),
            auth_calls: AtomicUsize::new(0),
            endpoint_calls: AtomicUsize::new(0),
            session_ids: AtomicUsize::new(0),
        }
    }

    /// Token returned by `authenticate` (empty = auth failure)
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock() = token.into();
    }

    /// Endpoints returned for every station
    pub fn set_endpoints(&self, endpoints: Vec<String>) {
        *self.endpoints.lock() = endpoints;
    }

    /// Make area lookup fail for a station
    pub fn forget_station(&self, station: &str) {
        self.unknown.lock().push(station.to_string());
    }

    /// Delay every auth call, to widen race windows
    pub fn set_auth_delay(&self, delay: Duration) {
        *self.auth_delay.lock() = delay;
    }

    pub fn area_calls(&self) -> usize {
        self.area_calls.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn endpoint_calls(&self) -> usize {
        self.endpoint_calls.load(Ordering::SeqCst)
    }

    pub fn session_ids_generated(&self) -> usize {
        self.session_ids.load(Ordering::SeqCst)
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StationDirectory for MockDirectory {
    async fn resolve_area(&self, station: &StationId) -> Result<String, DirectoryError> {
        self.area_calls.fetch_add(1, Ordering::SeqCst);
        if self.unknown.lock().iter().any(|s| s == station.as_str()) {
            return Err(DirectoryError::UnknownStation(station.to_string()));
        }
        Ok("JP13".to_string())
    }

    async fn authenticate(&self, _area: &str) -> Result<String, DirectoryError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.auth_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.token.lock().clone())
    }

    async fn resolve_stream_endpoints(
        &self,
        _station: &StationId,
    ) -> Result<Vec<String>, DirectoryError> {
        self.endpoint_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.lock().clone())
    }

    fn generate_session_id(&self) -> String {
        let n = self.session_ids.fetch_add(1, Ordering::SeqCst);
        format!("{:032x}", n + 1)
    }
}

/// Writer side of one mock transcoder's output
#[derive(Clone)]
pub struct MockFeed {
    writer: Arc<tokio::sync::Mutex<Option<DuplexStream>>>,
}

impl MockFeed {
    /// Emit bytes on the transcoder's output
    ///
    /// Returns false once the output has been closed.
    pub async fn write(&self, data: &[u8]) -> bool {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer.write_all(data).await.is_ok(),
            None => false,
        }
    }

    /// End the output with a clean EOF
    pub async fn close(&self) {
        self.writer.lock().await.take();
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}

/// Transcoder that never starts a process
pub struct MockTranscoder {
    spawns: AtomicUsize,
    stops: Arc<AtomicUsize>,
    fail: AtomicBool,
    requests: Mutex<Vec<TranscodeRequest>>,
    feeds: Mutex<HashMap<usize, MockFeed>>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            spawns: AtomicUsize::new(0),
            stops: Arc::new(AtomicUsize::new(0)),
            fail: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Make subsequent starts fail like a missing binary
    pub fn fail_spawns(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Processes started so far
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Processes stopped so far
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Processes started and not yet stopped
    pub fn running(&self) -> usize {
        self.spawns().saturating_sub(self.stops())
    }

    /// Requests seen so far, in start order
    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().clone()
    }

    /// Feed of the n-th started process (0-based)
    pub fn feed(&self, index: usize) -> Option<MockFeed> {
        self.feeds.lock().get(&index).cloned()
    }

    /// Feed of the most recently started process
    pub fn last_feed(&self) -> Option<MockFeed> {
        let index = self.spawns().checked_sub(1)?;
        self.feed(index)
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn start(&self, request: TranscodeRequest) -> std::io::Result<TranscoderProcess> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "mock transcoder binary not found",
            ));
        }

        let (reader, writer) = tokio::io::duplex(64 * 1024);
        let feed = MockFeed {
            writer: Arc::new(tokio::sync::Mutex::new(Some(writer))),
        };

        let diagnostics = Cursor::new(
            format!("mock transcoder started for {}\n", request.station).into_bytes(),
        );

        let index = self.spawns.fetch_add(1, Ordering::SeqCst);
        self.feeds.lock().insert(index, feed.clone());
        self.requests.lock().push(request);

        Ok(TranscoderProcess {
            output: Box::new(reader),
            diagnostics: Some(Box::new(diagnostics)),
            handle: Box::new(MockHandle {
                feed,
                stops: Arc::clone(&self.stops),
                stopped: false,
            }),
        })
    }
}

struct MockHandle {
    feed: MockFeed,
    stops: Arc<AtomicUsize>,
    stopped: bool,
}

#[async_trait]
impl ProcessHandle for MockHandle {
    async fn stop(&mut self) -> std::io::Result<()> {
        if !self.stopped {
            self.stopped = true;
            self.feed.close().await;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
