//! Upstream collaborators
//!
//! The relay core never talks to the radio service or spawns processes
//! directly. It goes through two narrow seams:
//!
//! - [`StationDirectory`]: area lookup, authentication, stream endpoint
//!   resolution and playback session ids
//! - [`Transcoder`]: starts the external decoder and hands back its output,
//!   its diagnostic stream and a handle to stop it
//!
//! Production uses [`FfmpegTranscoder`] and a directory implementation of
//! the caller's choice ([`StaticDirectory`] ships with the binary). Tests use
//! the fakes in `mock`, compiled only for this crate's tests or with the
//! `test-util` feature.

pub mod directory;
pub mod ffmpeg;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod static_dir;
pub mod transcoder;

pub use directory::{generate_session_id, DirectoryError, StationDirectory};
pub use ffmpeg::FfmpegTranscoder;
pub use static_dir::StaticDirectory;
pub use transcoder::{ByteSource, ProcessHandle, TranscodeRequest, Transcoder, TranscoderProcess};
