//! Media handling for the relay
//!
//! This module provides:
//! - Stream profiles (container passthrough vs raw PCM)
//! - Frame alignment of arbitrary byte reads
//! - In-place volume scaling of s16le PCM

pub mod aligner;
pub mod pcm;
pub mod profile;

pub use aligner::FrameAligner;
pub use pcm::PcmVolume;
pub use profile::{StreamProfile, PCM_CHANNELS, PCM_FRAME_SIZE, PCM_SAMPLE_RATE};
