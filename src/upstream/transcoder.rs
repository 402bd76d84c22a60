//! Transcoder seam

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::media::StreamProfile;
use crate::registry::StationId;

/// Boxed byte stream produced by a transcoder
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Everything needed to start one upstream decode session
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    /// Station being relayed
    pub station: StationId,
    /// Output profile
    pub profile: StreamProfile,
    /// Final upstream URL (session id embedded)
    pub url: String,
    /// Auth token injected as a request header
    pub auth_token: String,
}

/// A started transcoder
pub struct TranscoderProcess {
    /// Primary output in the profile's format
    pub output: ByteSource,
    /// Line-oriented diagnostics, if the transcoder has any
    pub diagnostics: Option<ByteSource>,
    /// Handle used to stop the process
    pub handle: Box<dyn ProcessHandle>,
}

impl std::fmt::Debug for TranscoderProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscoderProcess")
            .field("has_diagnostics", &self.diagnostics.is_some())
            .finish_non_exhaustive()
    }
}

/// Control handle of a running transcoder
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Signal termination and wait for the process to exit
    async fn stop(&mut self) -> std::io::Result<()>;
}

/// Starts transcoders
#[async_trait]
pub trait Transcoder: Send + Sync + 'static {
    async fn start(&self, request: TranscodeRequest) -> std::io::Result<TranscoderProcess>;
}
