//! Player capability set

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::error::PlayerError;

/// What an in-progress recording looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInfo {
    pub path: PathBuf,
    pub duration: Duration,
    pub station_name: String,
}

/// Uniform playback surface
///
/// Implementations that cannot record still implement the recording calls
/// and report [`PlayerError::RecordingUnsupported`].
#[async_trait]
pub trait Player: Send + Sync {
    /// Start playing a station
    async fn play(&self, station: &str) -> Result<(), PlayerError>;

    /// Stop playback; no-op when stopped
    async fn stop(&self);

    fn is_playing(&self) -> bool;

    /// Set the volume (clamped to 0.0..=1.0); unmutes
    fn set_volume(&self, volume: f64);

    fn volume(&self) -> f64;

    /// Raise the volume by `delta`; unmutes
    fn increase_volume(&self, delta: f64);

    /// Lower the volume by `delta`; unmutes
    fn decrease_volume(&self, delta: f64);

    fn toggle_mute(&self);

    fn is_muted(&self) -> bool;

    /// Drop the current connection and open a new one to the same station,
    /// keeping volume and mute state
    async fn reconnect(&self) -> Result<(), PlayerError>;

    fn start_recording(&self, station_name: &str) -> Result<(), PlayerError>;

    /// Stop recording, returning the file written
    fn stop_recording(&self) -> Result<PathBuf, PlayerError>;

    fn is_recording(&self) -> bool;

    fn recording_info(&self) -> Option<RecordingInfo>;

    /// Start or stop recording; returns whether recording is now on
    fn toggle_recording(&self, station_name: &str) -> Result<bool, PlayerError>;
}
