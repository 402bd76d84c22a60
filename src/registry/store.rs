//! Station registry implementation
//!
//! Maps each station to at most one live [`SharedStream`] and routes
//! listeners to it, starting the upstream transcoder on first use.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::media::StreamProfile;
use crate::session::ClientSession;
use crate::stats::StreamStatus;
use crate::upstream::{FfmpegTranscoder, StationDirectory, TranscodeRequest, Transcoder};

use super::config::RegistryConfig;
use super::entry::{SharedStream, StopCallback};
use super::error::SetupError;
use super::station::StationId;

type StreamMap = HashMap<StationId, Arc<SharedStream>>;

/// Registry of live shared streams for one output profile
///
/// Stream construction runs under a per-station setup lock, so concurrent
/// first subscribers to a station never start a second transcoder while
/// setups for other stations proceed in parallel. The station map lock
/// itself is only held for lookups and inserts.
pub struct StationRegistry {
    profile: StreamProfile,
    config: RegistryConfig,
    directory: Arc<dyn StationDirectory>,
    transcoder: Arc<dyn Transcoder>,
    streams: Arc<RwLock<StreamMap>>,
    /// Last playback session id per station, with when it was generated
    session_ids: parking_lot::Mutex<HashMap<StationId, (String, Instant)>>,
    /// One setup at a time per station
    setup_gates: parking_lot::Mutex<HashMap<StationId, Arc<tokio::sync::Mutex<()>>>>,
    shut_down: AtomicBool,
}

impl StationRegistry {
    /// Create a registry with explicit collaborators
    pub fn new(
        profile: StreamProfile,
        config: RegistryConfig,
        directory: Arc<dyn StationDirectory>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            profile,
            config,
            directory,
            transcoder,
            streams: Arc::new(RwLock::new(HashMap::new())),
            session_ids: parking_lot::Mutex::new(HashMap::new()),
            setup_gates: parking_lot::Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Create a registry that runs ffmpeg as configured
    pub fn with_ffmpeg(
        profile: StreamProfile,
        config: RegistryConfig,
        directory: Arc<dyn StationDirectory>,
    ) -> Self {
        let transcoder = FfmpegTranscoder::new(config.transcoder_binary.clone())
            .connect_timeout(config.connect_timeout)
            .reconnect_delay_max(config.reconnect_delay_max);
        Self::new(profile, config, directory, Arc::new(transcoder))
    }

    pub fn profile(&self) -> StreamProfile {
        self.profile
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Attach a listener to a station and wait until it leaves
    ///
    /// Fails only if the station's stream had to be started and could not
    /// be. Once attached, returns when `cancel` fires or the session is
    /// closed by its stream.
    pub async fn subscribe(
        &self,
        cancel: CancellationToken,
        station: &StationId,
        session: Arc<ClientSession>,
    ) -> Result<(), SetupError> {
        let stream = self.get_or_create(station).await?;
        stream.add_client(session, cancel).await;
        Ok(())
    }

    /// Running stream for a station, starting one if needed
    ///
    /// An existing stream has its grace timer cancelled and is returned as
    /// is. On failure nothing is registered. Setups are serialized per
    /// station only; other stations stay reachable meanwhile.
    pub async fn get_or_create(&self, station: &StationId) -> Result<Arc<SharedStream>, SetupError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SetupError::Shutdown);
        }
        if let Some(stream) = self.reuse(station).await {
            return Ok(stream);
        }

        let gate = self.setup_gate(station);
        let _setup = gate.lock().await;

        // Another request may have finished the setup while we waited
        if let Some(stream) = self.reuse(station).await {
            return Ok(stream);
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SetupError::Shutdown);
        }

        let stream = self.start_stream(station).await?;
        self.streams
            .write()
            .await
            .insert(station.clone(), Arc::clone(&stream));

        // Shutdown sets the flag before it snapshots the map
        if self.shut_down.load(Ordering::SeqCst) {
            stream.stop().await;
            return Err(SetupError::Shutdown);
        }
        Ok(stream)
    }

    async fn reuse(&self, station: &StationId) -> Option<Arc<SharedStream>> {
        let streams = self.streams.read().await;
        let stream = streams.get(station)?;
        stream.cancel_grace();
        if !stream.is_running() {
            return None;
        }
        tracing::info!(
            station = %station,
            profile = %self.profile,
            clients = stream.client_count(),
            "Reusing existing stream"
        );
        Some(Arc::clone(stream))
    }

    fn setup_gate(&self, station: &StationId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.setup_gates.lock().entry(station.clone()).or_default())
    }

    async fn start_stream(&self, station: &StationId) -> Result<Arc<SharedStream>, SetupError> {
        tracing::info!(station = %station, profile = %self.profile, "Starting new stream");

        let area = self
            .directory
            .resolve_area(station)
            .await
            .map_err(SetupError::Area)?;

        let token = self
            .directory
            .authenticate(&area)
            .await
            .map_err(SetupError::Auth)?;
        if token.is_empty() {
            tracing::warn!(station = %station, area = %area, "Empty auth token");
            return Err(SetupError::EmptyToken);
        }

        let endpoints = self
            .directory
            .resolve_stream_endpoints(station)
            .await
            .map_err(SetupError::Endpoints)?;
        let endpoint = endpoints
            .last()
            .ok_or_else(|| SetupError::NoEndpoints(station.to_string()))?;

        let session_id = self.session_id_for(station);
        let url = stream_url(endpoint, station, &session_id);
        tracing::debug!(station = %station, area = %area, url = %url, "Resolved upstream");

        let process = self
            .transcoder
            .start(TranscodeRequest {
                station: station.clone(),
                profile: self.profile,
                url,
                auth_token: token,
            })
            .await
            .map_err(|e| {
                tracing::error!(station = %station, error = %e, "Failed to start transcoder");
                SetupError::Spawn(e)
            })?;

        let stream = SharedStream::new(station.clone(), self.profile, &self.config);
        stream.set_on_stop(self.removal_callback(station.clone()));
        stream.launch(process).await;
        Ok(stream)
    }

    fn session_id_for(&self, station: &StationId) -> String {
        let Some(window) = self.config.session_id_reuse else {
            return self.directory.generate_session_id();
        };

        let mut ids = self.session_ids.lock();
        let now = Instant::now();
        if let Some((id, generated_at)) = ids.get(station) {
            if now.duration_since(*generated_at) < window {
                tracing::debug!(station = %station, "Reusing playback session id");
                return id.clone();
            }
        }

        let id = self.directory.generate_session_id();
        ids.insert(station.clone(), (id.clone(), now));
        id
    }

    // Removes the entry only if it still points at the instance that stopped
    fn removal_callback(&self, station: StationId) -> StopCallback {
        let streams = Arc::downgrade(&self.streams);
        let profile = self.profile;

        Box::new(move |instance| {
            Box::pin(async move {
                let Some(streams) = streams.upgrade() else {
                    return;
                };
                let mut streams = streams.write().await;
                if streams
                    .get(&station)
                    .is_some_and(|stream| stream.instance() == instance)
                {
                    streams.remove(&station);
                    tracing::info!(
                        station = %station,
                        profile = %profile,
                        streams = streams.len(),
                        "Stream removed from registry"
                    );
                }
            })
        })
    }

    /// Live stream for a station, if any
    pub async fn get(&self, station: &StationId) -> Option<Arc<SharedStream>> {
        self.streams.read().await.get(station).cloned()
    }

    /// Number of registered streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Per-station status, keyed by the profile's status key
    pub async fn status(&self) -> BTreeMap<String, StreamStatus> {
        self.streams
            .read()
            .await
            .iter()
            .map(|(station, stream)| (self.profile.status_key(station.as_str()), stream.status()))
            .collect()
    }

    /// Stop every live stream and refuse new ones
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);

        let streams: Vec<Arc<SharedStream>> = self.streams.read().await.values().cloned().collect();
        tracing::info!(profile = %self.profile, streams = streams.len(), "Shutting down registry");

        for stream in streams {
            stream.stop().await;
        }
    }
}

/// Final upstream URL for a playback session
pub fn stream_url(endpoint: &str, station: &StationId, session_id: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{}{}station_id={}&l=30&lsid={}&type=b",
        endpoint, separator, station, session_id
    )
}
