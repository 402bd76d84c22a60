//! HTTP relay server
//!
//! Serves the shared streams of two [`StationRegistry`](crate::registry::StationRegistry)
//! instances, one per output profile, over axum.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::{resolve_client_ip, router, AppState};
