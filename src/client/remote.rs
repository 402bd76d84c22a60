//! Player that consumes the relay's PCM endpoint
//!
//! The read path scales every sample by the current volume and stamps the
//! time of the last received byte. A monitor task compares that stamp against
//! the stall timeout on a fixed interval and, when the stream has gone quiet,
//! tears the connection down and opens a new one to the same station.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::media::PcmVolume;

use super::config::{clamp_volume, PlayerConfig};
use super::error::PlayerError;
use super::output::PcmOutput;
use super::player::{Player, RecordingInfo};

/// Events from the remote player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Connection opened and audio is flowing
    Connected { station: String },

    /// No data for longer than the stall timeout
    Stalled { station: String, silent_for: Duration },

    /// Reconnect after a stall succeeded
    Reconnected { station: String },

    /// Reconnect after a stall failed; playback is stopped
    ReconnectFailed { station: String, error: String },

    /// The server closed the stream
    StreamEnded { station: String },

    /// Playback stopped
    Stopped,
}

/// Plays a station from a relay server
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use radio_relay::client::{Player, PlayerConfig, RemotePlayer, StdoutOutput};
///
/// # async fn example() -> Result<(), radio_relay::client::PlayerError> {
/// let config = PlayerConfig::new("http://127.0.0.1:8080");
/// let (player, mut events) = RemotePlayer::new(config, Arc::new(StdoutOutput::new()));
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         eprintln!("Event: {:?}", event);
///     }
/// });
///
/// player.play("QRR").await?;
/// # Ok(())
/// # }
/// ```
pub struct RemotePlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    config: PlayerConfig,
    http: reqwest::Client,
    output: Arc<dyn PcmOutput>,
    events: mpsc::Sender<PlayerEvent>,
    /// Serializes play / stop / reconnect
    control: tokio::sync::Mutex<()>,
    state: Mutex<PlayerState>,
}

struct PlayerState {
    station: Option<String>,
    playing: bool,
    volume: f64,
    muted: bool,
    last_data: Instant,
    /// Bumped on every connect so stale tasks can tell they were replaced
    connection: u64,
    cancel: Option<CancellationToken>,
}

impl PlayerState {
    fn effective_volume(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

impl RemotePlayer {
    /// Create a player writing decoded audio to `output`
    ///
    /// Returns the player and a receiver for events.
    pub fn new(config: PlayerConfig, output: Arc<dyn PcmOutput>) -> (Self, mpsc::Receiver<PlayerEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let volume = clamp_volume(config.initial_volume);

        let inner = PlayerInner {
            config,
            http: reqwest::Client::new(),
            output,
            events: tx,
            control: tokio::sync::Mutex::new(()),
            state: Mutex::new(PlayerState {
                station: None,
                playing: false,
                volume,
                muted: false,
                last_data: Instant::now(),
                connection: 0,
                cancel: None,
            }),
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    /// Station currently (or most recently) played
    pub fn station(&self) -> Option<String> {
        self.inner.state.lock().station.clone()
    }

    /// Time since the last byte arrived
    pub fn silent_for(&self) -> Duration {
        self.inner.state.lock().last_data.elapsed()
    }

    fn adjust_volume(&self, f: impl FnOnce(f64) -> f64) {
        let mut state = self.inner.state.lock();
        state.volume = clamp_volume(f(state.volume));
        state.muted = false;
    }
}

impl PlayerInner {
    fn emit(&self, event: PlayerEvent) {
        if self.events.try_send(event).is_err() {
            tracing::trace!("Player event dropped");
        }
    }

    /// Open the PCM endpoint and start the read and monitor tasks
    ///
    /// Boxed because the monitor it spawns may call back into it.
    fn connect(self: &Arc<Self>, station: String) -> BoxFuture<'static, Result<(), PlayerError>> {
        let inner = Arc::clone(self);
        async move {
            let url = inner.config.stream_url(&station);
            tracing::info!(station = %station, url = %url, "Connecting to relay");

            let timeout = inner.config.connect_timeout;
            let response = tokio::time::timeout(timeout, inner.http.get(&url).send())
                .await
                .map_err(|_| PlayerError::Timeout(timeout))??;
            if response.status() != reqwest::StatusCode::OK {
                return Err(PlayerError::Status(response.status().as_u16()));
            }

            let cancel = CancellationToken::new();
            let connection = {
                let mut state = inner.state.lock();
                state.connection += 1;
                state.station = Some(station.clone());
                state.playing = true;
                state.last_data = Instant::now();
                state.cancel = Some(cancel.clone());
                state.connection
            };

            tokio::spawn(read_stream(
                Arc::clone(&inner),
                response,
                station.clone(),
                connection,
                cancel.clone(),
            ));
            tokio::spawn(monitor(Arc::clone(&inner), connection, cancel));

            inner.emit(PlayerEvent::Connected { station });
            Ok(())
        }
        .boxed()
    }

    /// Returns whether playback was active
    fn halt(&self) -> bool {
        let mut state = self.state.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        std::mem::replace(&mut state.playing, false)
    }

    /// Stop one connection if it is still the current one
    fn halt_connection(&self, connection: u64) {
        {
            let mut state = self.state.lock();
            if state.connection != connection || !state.playing {
                return;
            }
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            state.playing = false;
        }
        self.emit(PlayerEvent::Stopped);
    }

    /// Caller holds `control`
    async fn reconnect_locked(self: &Arc<Self>) -> Result<(), PlayerError> {
        let (station, volume, muted) = {
            let state = self.state.lock();
            let station = state.station.clone().ok_or(PlayerError::NoStation)?;
            (station, state.volume, state.muted)
        };

        self.halt();
        tokio::time::sleep(self.config.reconnect_pause).await;

        {
            let mut state = self.state.lock();
            state.volume = volume;
            state.muted = muted;
        }
        self.connect(station).await
    }

    /// Reconnect on behalf of a monitor; `Ok(false)` if that connection was
    /// stopped or replaced in the meantime
    async fn reconnect_stalled(self: &Arc<Self>, connection: u64) -> Result<bool, PlayerError> {
        let _control = self.control.lock().await;
        {
            let state = self.state.lock();
            if state.connection != connection || !state.playing {
                return Ok(false);
            }
        }
        self.reconnect_locked().await.map(|()| true)
    }
}

async fn read_stream(
    inner: Arc<PlayerInner>,
    response: reqwest::Response,
    station: String,
    connection: u64,
    cancel: CancellationToken,
) {
    let mut stream = response.bytes_stream();
    let mut volume = PcmVolume::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(data)) => {
                let level = {
                    let mut state = inner.state.lock();
                    state.last_data = Instant::now();
                    state.effective_volume()
                };
                let Some(pcm) = volume.process(&data, level) else {
                    continue;
                };
                if let Err(e) = inner.output.write(pcm).await {
                    tracing::error!(station = %station, error = %e, "Audio output failed, stopping");
                    inner.halt_connection(connection);
                    return;
                }
            }
            Some(Err(e)) => {
                // Left to the monitor, which will notice the silence
                tracing::warn!(station = %station, error = %e, "Stream read error");
                return;
            }
            None => {
                tracing::info!(station = %station, "Stream ended by server");
                inner.emit(PlayerEvent::StreamEnded { station });
                return;
            }
        }
    }
}

async fn monitor(inner: Arc<PlayerInner>, connection: u64, cancel: CancellationToken) {
    let period = inner.config.check_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let (silent_for, station) = {
            let state = inner.state.lock();
            (state.last_data.elapsed(), state.station.clone().unwrap_or_default())
        };
        if silent_for <= inner.config.stall_timeout {
            continue;
        }

        tracing::warn!(
            station = %station,
            silent_ms = silent_for.as_millis() as u64,
            "No data received, reconnecting"
        );
        inner.emit(PlayerEvent::Stalled {
            station: station.clone(),
            silent_for,
        });

        match inner.reconnect_stalled(connection).await {
            Ok(true) => {
                tracing::info!(station = %station, "Reconnected");
                inner.emit(PlayerEvent::Reconnected { station });
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(station = %station, error = %e, "Reconnect failed");
                inner.emit(PlayerEvent::ReconnectFailed {
                    station,
                    error: e.to_string(),
                });
            }
        }
        // A successful reconnect started a fresh monitor
        return;
    }
}

#[async_trait]
impl Player for RemotePlayer {
    async fn play(&self, station: &str) -> Result<(), PlayerError> {
        let _control = self.inner.control.lock().await;
        if self.inner.state.lock().playing {
            return Err(PlayerError::AlreadyPlaying);
        }
        self.inner.connect(station.to_string()).await
    }

    async fn stop(&self) {
        let _control = self.inner.control.lock().await;
        if self.inner.halt() {
            tracing::info!("Playback stopped");
            self.inner.emit(PlayerEvent::Stopped);
        }
    }

    fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    fn set_volume(&self, volume: f64) {
        self.adjust_volume(|_| volume);
    }

    fn volume(&self) -> f64 {
        self.inner.state.lock().volume
    }

    fn increase_volume(&self, delta: f64) {
        self.adjust_volume(|v| v + delta);
    }

    fn decrease_volume(&self, delta: f64) {
        self.adjust_volume(|v| v - delta);
    }

    fn toggle_mute(&self) {
        let mut state = self.inner.state.lock();
        state.muted = !state.muted;
    }

    fn is_muted(&self) -> bool {
        self.inner.state.lock().muted
    }

    async fn reconnect(&self) -> Result<(), PlayerError> {
        let _control = self.inner.control.lock().await;
        self.inner.reconnect_locked().await
    }

    fn start_recording(&self, _station_name: &str) -> Result<(), PlayerError> {
        Err(PlayerError::RecordingUnsupported)
    }

    fn stop_recording(&self) -> Result<PathBuf, PlayerError> {
        Err(PlayerError::RecordingUnsupported)
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn recording_info(&self) -> Option<RecordingInfo> {
        None
    }

    fn toggle_recording(&self, _station_name: &str) -> Result<bool, PlayerError> {
        Err(PlayerError::RecordingUnsupported)
    }
}

impl Drop for RemotePlayer {
    fn drop(&mut self) {
        self.inner.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChannelOutput;

    fn player(config: PlayerConfig) -> (RemotePlayer, mpsc::Receiver<PlayerEvent>) {
        let (output, _rx) = ChannelOutput::new(8);
        RemotePlayer::new(config, Arc::new(output))
    }

    #[test]
    fn test_volume_is_clamped() {
        let (player, _events) = player(PlayerConfig::new("http://127.0.0.1:1"));
        assert_eq!(player.volume(), 0.8);

        player.set_volume(1.7);
        assert_eq!(player.volume(), 1.0);

        player.set_volume(-3.0);
        assert_eq!(player.volume(), 0.0);

        player.increase_volume(0.25);
        assert_eq!(player.volume(), 0.25);

        player.decrease_volume(1.0);
        assert_eq!(player.volume(), 0.0);
    }

    #[test]
    fn test_volume_change_unmutes() {
        let (player, _events) = player(PlayerConfig::new("http://127.0.0.1:1"));

        player.toggle_mute();
        assert!(player.is_muted());
        assert_eq!(player.inner.state.lock().effective_volume(), 0.0);

        player.increase_volume(0.1);
        assert!(!player.is_muted());
        assert!((player.volume() - 0.9).abs() < 1e-9);

        player.toggle_mute();
        player.set_volume(0.5);
        assert!(!player.is_muted());

        player.toggle_mute();
        player.decrease_volume(0.1);
        assert!(!player.is_muted());
    }

    #[test]
    fn test_recording_is_unsupported() {
        let (player, _events) = player(PlayerConfig::new("http://127.0.0.1:1"));

        assert!(matches!(
            player.start_recording("QRR"),
            Err(PlayerError::RecordingUnsupported)
        ));
        assert!(matches!(
            player.stop_recording(),
            Err(PlayerError::RecordingUnsupported)
        ));
        assert!(matches!(
            player.toggle_recording("QRR"),
            Err(PlayerError::RecordingUnsupported)
        ));
        assert!(!player.is_recording());
        assert!(player.recording_info().is_none());
    }

    #[tokio::test]
    async fn test_reconnect_without_station() {
        let (player, _events) = player(PlayerConfig::new("http://127.0.0.1:1"));
        assert!(matches!(player.reconnect().await, Err(PlayerError::NoStation)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (player, _events) = player(PlayerConfig::new(format!("http://{}", addr)));
        let err = player.play("QRR").await.unwrap_err();

        assert!(matches!(err, PlayerError::Connect(_)));
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_connect_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the socket without ever answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let config = PlayerConfig::new(format!("http://{}", addr))
            .connect_timeout(Duration::from_millis(200));
        let (player, mut events) = player(config);

        let started = std::time::Instant::now();
        let err = player.play("QRR").await.unwrap_err();

        assert!(matches!(err, PlayerError::Timeout(t) if t == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!player.is_playing());
        assert!(events.try_recv().is_err());

        // The control lock was released with the error
        tokio::time::timeout(Duration::from_secs(1), player.stop())
            .await
            .unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let (player, mut events) = player(PlayerConfig::new("http://127.0.0.1:1"));
        player.stop().await;

        assert!(!player.is_playing());
        assert!(events.try_recv().is_err());
    }
}
