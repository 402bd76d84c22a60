//! Station directory backed by a JSON file
//!
//! ```json
//! {
//!   "stations": {
//!     "QRR": { "area": "JP13", "endpoints": ["https://example/playlist.m3u8"] }
//!   },
//!   "tokens": { "JP13": "..." }
//! }
//! ```
//!
//! Tokens are expected to be provisioned out of band; this directory only
//! hands them back per area.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::directory::{DirectoryError, StationDirectory};
use crate::error::{Error, Result};
use crate::registry::StationId;

#[derive(Debug, Clone, Deserialize)]
struct StationEntry {
    area: String,
    #[serde(default)]
    endpoints: Vec<String>,
}

/// Fixed station table loaded at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    stations: HashMap<String, StationEntry>,
    #[serde(default)]
    tokens: HashMap<String, String>,
}

impl StaticDirectory {
    /// Parse a directory from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("station directory: {}", e)))
    }

    /// Load a directory from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let directory = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            stations = directory.stations.len(),
            areas = directory.tokens.len(),
            "Station directory loaded"
        );
        Ok(directory)
    }

    /// Number of known stations
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[async_trait]
impl StationDirectory for StaticDirectory {
    async fn resolve_area(&self, station: &StationId) -> std::result::Result<String, DirectoryError> {
        self.stations
            .get(station.as_str())
            .map(|entry| entry.area.clone())
            .ok_or_else(|| DirectoryError::UnknownStation(station.to_string()))
    }

    async fn authenticate(&self, area: &str) -> std::result::Result<String, DirectoryError> {
        // Unknown area yields an empty token, which the relay treats as auth failure
        Ok(self.tokens.get(area).cloned().unwrap_or_default())
    }

    async fn resolve_stream_endpoints(
        &self,
        station: &StationId,
    ) -> std::result::Result<Vec<String>, DirectoryError> {
        self.stations
            .get(station.as_str())
            .map(|entry| entry.endpoints.clone())
            .ok_or_else(|| DirectoryError::UnknownStation(station.to_string()))
    }
}
