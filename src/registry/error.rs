//! Registry error types

use crate::upstream::DirectoryError;

/// Why a shared stream could not be started
///
/// A station is never registered when any of these occur.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to get area ID: {0}")]
    Area(#[source] DirectoryError),

    #[error("authentication failed: {0}")]
    Auth(#[source] DirectoryError),

    #[error("authentication failed: empty auth token")]
    EmptyToken,

    #[error("failed to get stream URL: {0}")]
    Endpoints(#[source] DirectoryError),

    #[error("no stream URLs available for station {0}")]
    NoEndpoints(String),

    #[error("failed to start transcoder: {0}")]
    Spawn(#[source] std::io::Error),

    /// Registry is shutting down
    #[error("registry is shut down")]
    Shutdown,
}
