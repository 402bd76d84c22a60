#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use radio_relay::upstream::mock::{MockDirectory, MockTranscoder};
use radio_relay::upstream::{StationDirectory, Transcoder};
use radio_relay::{RegistryConfig, RelayServer, ServerConfig, StationId, StationRegistry};

pub struct Relay {
    pub server: RelayServer,
    pub directory: Arc<MockDirectory>,
    pub transcoder: Arc<MockTranscoder>,
}

pub fn relay() -> Relay {
    relay_with(RegistryConfig::default())
}

pub fn relay_with(registry: RegistryConfig) -> Relay {
    let directory = Arc::new(MockDirectory::new());
    let transcoder = Arc::new(MockTranscoder::new());
    let server = RelayServer::with_transcoder(
        ServerConfig::default().registry(registry),
        Arc::clone(&directory) as Arc<dyn StationDirectory>,
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
    );
    Relay {
        server,
        directory,
        transcoder,
    }
}

/// Wait until a station has exactly `clients` listeners attached
pub async fn wait_clients(registry: &StationRegistry, station: &str, clients: usize) {
    let station = StationId::from(station);
    for _ in 0..500 {
        let count = registry.get(&station).await.map(|s| s.client_count());
        if count == Some(clients) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {} listeners on {}", clients, station);
}

/// Wait until a station has no stream in the registry
pub async fn wait_removed(registry: &StationRegistry, station: &str) {
    let station = StationId::from(station);
    for _ in 0..500 {
        if registry.get(&station).await.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {} to be removed", station);
}

pub fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn decode(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}
