//! Stream profiles
//!
//! A profile fixes everything that differs between the two relay outputs:
//! how the transcoder is asked to write its output, how reads are framed,
//! how deep the buffers are, and what the HTTP response announces. The
//! lifecycle logic in [`crate::registry`] is shared by both.

/// PCM sample rate produced by the raw profile
pub const PCM_SAMPLE_RATE: u32 = 48_000;

/// PCM channel count produced by the raw profile
pub const PCM_CHANNELS: u16 = 2;

/// Bytes per interleaved PCM frame (2 channels x 16-bit)
pub const PCM_FRAME_SIZE: usize = 4;

/// Output profile of a shared stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamProfile {
    /// Compressed audio copied out of the upstream container (ADTS)
    ContainerPassthrough,
    /// Interleaved s16le stereo at 48 kHz
    RawPcm,
}

impl StreamProfile {
    /// Short label used in logs and status keys
    pub fn label(&self) -> &'static str {
        match self {
            StreamProfile::ContainerPassthrough => "aac",
            StreamProfile::RawPcm => "pcm",
        }
    }

    /// Frame size every broadcast chunk must be a multiple of
    ///
    /// `None` means the container framing is opaque and reads are forwarded
    /// as they arrive.
    pub fn frame_size(&self) -> Option<usize> {
        match self {
            StreamProfile::ContainerPassthrough => None,
            StreamProfile::RawPcm => Some(PCM_FRAME_SIZE),
        }
    }

    /// Capacity of the per-stream broadcast queue, in chunks
    ///
    /// Uncompressed audio arrives at a much higher byte rate, so the PCM
    /// profile gets a deeper queue.
    pub fn queue_capacity(&self) -> usize {
        match self {
            StreamProfile::ContainerPassthrough => 100,
            StreamProfile::RawPcm => 500,
        }
    }

    /// Depth of each client's outgoing buffer, in chunks
    pub fn client_buffer(&self) -> usize {
        match self {
            StreamProfile::ContainerPassthrough => 64,
            StreamProfile::RawPcm => 256,
        }
    }

    /// Transcoder output arguments (everything after `-i <url>`)
    pub fn output_args(&self) -> &'static [&'static str] {
        match self {
            StreamProfile::ContainerPassthrough => &[
                "-c:a",
                "copy",
                "-f",
                "adts",
                "-fflags",
                "+nobuffer+flush_packets",
                "-flags",
                "low_delay",
                "-loglevel",
                "warning",
                "pipe:1",
            ],
            StreamProfile::RawPcm => &[
                "-f",
                "s16le",
                "-ar",
                "48000",
                "-ac",
                "2",
                "-fflags",
                "+nobuffer+flush_packets",
                "-flags",
                "low_delay",
                "-loglevel",
                "error",
                "pipe:1",
            ],
        }
    }

    /// `Content-Type` of the relayed body
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamProfile::ContainerPassthrough => "audio/aac",
            StreamProfile::RawPcm => "audio/L16;rate=48000;channels=2",
        }
    }

    /// Format-describing headers sent alongside the body
    pub fn format_headers(&self, station: &str, name_prefix: &str) -> Vec<(&'static str, String)> {
        match self {
            StreamProfile::ContainerPassthrough => vec![
                ("icy-name", format!("{} - {}", name_prefix, station)),
                ("icy-genre", "Radio".to_string()),
            ],
            StreamProfile::RawPcm => vec![
                ("x-audio-format", "s16le".to_string()),
                ("x-sample-rate", PCM_SAMPLE_RATE.to_string()),
                ("x-channels", PCM_CHANNELS.to_string()),
            ],
        }
    }

    /// Key under which a station of this profile shows up in `/api/status`
    pub fn status_key(&self, station: &str) -> String {
        match self {
            StreamProfile::ContainerPassthrough => station.to_string(),
            StreamProfile::RawPcm => format!("{}/pcm", station),
        }
    }
}

impl std::fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
