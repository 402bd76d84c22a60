//! Player error types

use std::time::Duration;

/// Error returned by a [`Player`](super::Player)
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("already playing")]
    AlreadyPlaying,

    /// Reconnect requested before anything was played
    #[error("no station to reconnect to")]
    NoStation,

    #[error("failed to connect to server: {0}")]
    Connect(#[from] reqwest::Error),

    /// The relay accepted the connection but sent no response in time
    #[error("no response from server within {0:?}")]
    Timeout(Duration),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("recording is not supported in server mode")]
    RecordingUnsupported,
}
