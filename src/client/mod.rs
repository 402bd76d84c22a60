//! Listener side of the relay
//!
//! [`RemotePlayer`] pulls raw PCM from a relay's `/api/play/{station}/pcm`
//! endpoint, applies volume, and reconnects when the stream stalls.

pub mod config;
pub mod error;
pub mod output;
pub mod player;
pub mod remote;

pub use config::PlayerConfig;
pub use error::PlayerError;
pub use output::{ChannelOutput, PcmOutput, StdoutOutput};
pub use player::{Player, RecordingInfo};
pub use remote::{PlayerEvent, RemotePlayer};
