//! Shared-stream radio relay
//!
//! Lets any number of HTTP listeners tune into the same live station while
//! only one upstream transcoder process runs per station.
//!
//! ```text
//!   GET /api/play/QRR ─┐
//!   GET /api/play/QRR ─┼─► StationRegistry ──► SharedStream("QRR")
//!   GET /api/play/QRR ─┘        │                 │
//!                               │        transcoder stdout
//!                               │                 │ FrameAligner
//!                               │                 ▼
//!                               │          BroadcastQueue (drop-oldest)
//!                               │                 │ broadcaster
//!                               │                 ▼
//!                               └──────► ClientSession sinks ──► HTTP bodies
//! ```
//!
//! The crate also ships the consumer side of the PCM endpoint
//! ([`client::RemotePlayer`]), which watches for stalls and reconnects
//! transparently while keeping its volume and mute state.

pub mod client;
pub mod error;
pub mod media;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod upstream;

pub use error::{Error, Result};
pub use media::StreamProfile;
pub use registry::{RegistryConfig, SharedStream, StationId, StationRegistry};
pub use server::{RelayServer, ServerConfig};
