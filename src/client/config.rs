//! Remote player configuration

use std::time::Duration;

/// Configuration for a [`RemotePlayer`](super::RemotePlayer)
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Base URL of the relay (e.g. `http://127.0.0.1:8080`)
    pub server_url: String,

    /// Volume at start, 0.0 to 1.0
    pub initial_volume: f64,

    /// Silence longer than this triggers a reconnect
    pub stall_timeout: Duration,

    /// How often the stall check runs
    pub check_interval: Duration,

    /// Pause between dropping the old connection and opening a new one
    pub reconnect_pause: Duration,

    /// Longest wait for the relay to answer a stream request
    pub connect_timeout: Duration,
}

impl PlayerConfig {
    /// Create a config for a relay at `server_url`
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            initial_volume: 0.8,
            stall_timeout: Duration::from_secs(5),
            check_interval: Duration::from_secs(2),
            reconnect_pause: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the initial volume (clamped to 0.0..=1.0)
    pub fn initial_volume(mut self, volume: f64) -> Self {
        self.initial_volume = clamp_volume(volume);
        self
    }

    /// Set the stall threshold
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the stall check interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the pause before reconnecting
    pub fn reconnect_pause(mut self, pause: Duration) -> Self {
        self.reconnect_pause = pause;
        self
    }

    /// Set how long a stream request may wait for response headers
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// PCM endpoint of a station
    pub fn stream_url(&self, station: &str) -> String {
        format!(
            "{}/api/play/{}/pcm",
            self.server_url.trim_end_matches('/'),
            station
        )
    }
}

pub(crate) fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::new("http://localhost:8080");

        assert_eq!(config.initial_volume, 0.8);
        assert_eq!(config.stall_timeout, Duration::from_secs(5));
        assert_eq!(config.check_interval, Duration::from_secs(2));
        assert_eq!(config.reconnect_pause, Duration::from_millis(500));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));

        let config = config.connect_timeout(Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            PlayerConfig::new("http://localhost:8080/").stream_url("QRR"),
            "http://localhost:8080/api/play/QRR/pcm"
        );
        assert_eq!(
            PlayerConfig::new("http://relay").stream_url("FMJ"),
            "http://relay/api/play/FMJ/pcm"
        );
    }

    #[test]
    fn test_initial_volume_clamped() {
        assert_eq!(PlayerConfig::new("x").initial_volume(1.5).initial_volume, 1.0);
        assert_eq!(PlayerConfig::new("x").initial_volume(-0.5).initial_volume, 0.0);
        assert_eq!(PlayerConfig::new("x").initial_volume(f64::NAN).initial_volume, 0.0);
    }
}
