//! Station registry and shared streams
//!
//! The registry maps each station to at most one live [`SharedStream`].
//! A stream owns the upstream transcoder and fans its output out to every
//! attached [`ClientSession`](crate::session::ClientSession).
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StationRegistry>
//!                   ┌──────────────────────────┐
//!                   │ streams: HashMap<Station,│
//!                   │   SharedStream {         │
//!                   │     queue,               │
//!                   │     clients,             │
//!                   │     grace,               │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!      transcoder ──► producer ──► BroadcastQueue ──► broadcaster
//!                                                      │
//!                          ┌───────────────────────────┼───────────┐
//!                          ▼                           ▼           ▼
//!                     [Session]                   [Session]   [Session]
//! ```
//!
//! # Zero-Copy Fan-out
//!
//! Chunks are `bytes::Bytes`, so every session shares the same allocation;
//! handing a chunk to a listener only bumps a reference count.

pub mod config;
pub mod entry;
pub mod error;
pub mod queue;
pub mod station;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{SharedStream, StopCallback, StreamPhase};
pub use error::SetupError;
pub use queue::BroadcastQueue;
pub use station::StationId;
pub use store::{stream_url, StationRegistry};
