//! Station directory seam

use async_trait::async_trait;

use crate::registry::StationId;

/// Error returned by a [`StationDirectory`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// Station is not known to the directory
    #[error("unknown station: {0}")]
    UnknownStation(String),

    /// Authentication request could not be completed
    #[error("authentication request failed: {0}")]
    Auth(String),

    /// Transport or decoding failure talking to the radio service
    #[error("directory request failed: {0}")]
    Request(String),
}

/// Lookups the relay needs before it can start a transcoder
#[async_trait]
pub trait StationDirectory: Send + Sync + 'static {
    /// Area the station broadcasts in
    async fn resolve_area(&self, station: &StationId) -> Result<String, DirectoryError>;

    /// Auth token for an area
    ///
    /// An empty token means authentication failed.
    async fn authenticate(&self, area: &str) -> Result<String, DirectoryError>;

    /// Candidate stream endpoints, least preferred first
    async fn resolve_stream_endpoints(
        &self,
        station: &StationId,
    ) -> Result<Vec<String>, DirectoryError>;

    /// Fresh playback session id
    fn generate_session_id(&self) -> String {
        generate_session_id()
    }
}

/// 32 lowercase hex characters
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
