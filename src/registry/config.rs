//! Registry configuration

use std::time::Duration;

/// Default grace period after the last listener leaves
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Configuration shared by every stream the registry creates
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an idle stream keeps its transcoder alive
    pub grace_period: Duration,

    /// Transcoder binary (name on PATH or full path)
    pub transcoder_binary: String,

    /// Network I/O timeout handed to the transcoder
    pub connect_timeout: Duration,

    /// Upper bound of the transcoder's reconnect backoff
    pub reconnect_delay_max: Duration,

    /// Size of each read from the transcoder output
    pub read_buffer_size: usize,

    /// Reuse a station's last playback session id within this window
    ///
    /// `None` generates a fresh id for every new stream.
    pub session_id_reuse: Option<Duration>,

    /// Prefix of the advertised stream name (`icy-name`)
    pub stream_name_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            transcoder_binary: "ffmpeg".to_string(),
            connect_timeout: Duration::from_secs(30),
            reconnect_delay_max: Duration::from_secs(10),
            read_buffer_size: 8192,
            session_id_reuse: None,
            stream_name_prefix: "Radiko".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Set the grace period
    ///
    /// A zero duration falls back to the default.
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.grace_period = if period.is_zero() {
            DEFAULT_GRACE_PERIOD
        } else {
            period
        };
        self
    }

    /// Set the grace period from a signed number of seconds (CLI input)
    pub fn grace_period_secs(self, secs: i64) -> Self {
        match u64::try_from(secs) {
            Ok(secs) => self.grace_period(Duration::from_secs(secs)),
            Err(_) => self.grace_period(Duration::ZERO),
        }
    }

    /// Set the transcoder binary
    pub fn transcoder_binary(mut self, binary: impl Into<String>) -> Self {
        self.transcoder_binary = binary.into();
        self
    }

    /// Set the transcoder connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the transcoder reconnect backoff ceiling
    pub fn reconnect_delay_max(mut self, delay: Duration) -> Self {
        self.reconnect_delay_max = delay;
        self
    }

    /// Set the read buffer size (minimum 1 byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Reuse playback session ids generated within `window`
    pub fn session_id_reuse(mut self, window: Duration) -> Self {
        self.session_id_reuse = Some(window);
        self
    }

    /// Set the stream name prefix
    pub fn stream_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.stream_name_prefix = prefix.into();
        self
    }
}
