//! ffmpeg-backed transcoder

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::transcoder::{ByteSource, ProcessHandle, TranscodeRequest, Transcoder, TranscoderProcess};

/// Header carrying the upstream auth token
pub const AUTH_TOKEN_HEADER: &str = "X-Radiko-AuthToken";

/// Runs `ffmpeg` as the upstream decoder
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
    connect_timeout: Duration,
    reconnect_delay_max: Duration,
}

impl FfmpegTranscoder {
    /// Use the given ffmpeg binary (name on PATH or full path)
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            connect_timeout: Duration::from_secs(30),
            reconnect_delay_max: Duration::from_secs(10),
        }
    }

    /// Network I/O timeout handed to ffmpeg
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Upper bound of ffmpeg's reconnect backoff
    pub fn reconnect_delay_max(mut self, delay: Duration) -> Self {
        self.reconnect_delay_max = delay;
        self
    }

    /// Full argument list for a request
    pub fn args(&self, request: &TranscodeRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-reconnect".into(),
            "1".into(),
            "-reconnect_streamed".into(),
            "1".into(),
            "-reconnect_delay_max".into(),
            self.reconnect_delay_max.as_secs().to_string(),
            "-timeout".into(),
            self.connect_timeout.as_micros().to_string(),
            "-headers".into(),
            format!("{}: {}\r\n", AUTH_TOKEN_HEADER, request.auth_token),
            "-i".into(),
            request.url.clone(),
        ];
        args.extend(request.profile.output_args().iter().map(|a| a.to_string()));
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn start(&self, request: TranscodeRequest) -> std::io::Result<TranscoderProcess> {
        let mut child = Command::new(&self.binary)
            .args(self.args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdout not captured"))?;
        let diagnostics = child.stderr.take();

        tracing::debug!(
            station = %request.station,
            profile = %request.profile,
            pid = ?child.id(),
            "ffmpeg spawned"
        );

        Ok(TranscoderProcess {
            output: Box::new(output),
            diagnostics: diagnostics.map(|d| Box::new(d) as ByteSource),
            handle: Box::new(FfmpegHandle { child }),
        })
    }
}

struct FfmpegHandle {
    child: Child,
}

#[async_trait]
impl ProcessHandle for FfmpegHandle {
    async fn stop(&mut self) -> std::io::Result<()> {
        // Already exited is fine, wait() still reaps it
        if let Err(e) = self.child.start_kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(e);
            }
        }
        let status = self.child.wait().await?;
        tracing::debug!(status = %status, "ffmpeg exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamProfile;
    use crate::registry::StationId;

    fn request(profile: StreamProfile) -> TranscodeRequest {
        TranscodeRequest {
            station: StationId::new("QRR"),
            profile,
            url: "https://example.invalid/playlist.m3u8?station_id=QRR".into(),
            auth_token: "tok123".into(),
        }
    }

    #[test]
    fn test_args_inject_auth_header_and_url() {
        let args = FfmpegTranscoder::default().args(&request(StreamProfile::ContainerPassthrough));

        let header = args.iter().position(|a| a == "-headers").unwrap();
        assert_eq!(args[header + 1], "X-Radiko-AuthToken: tok123\r\n");

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(args[input + 1].starts_with("https://example.invalid/"));
        assert!(input > header);
    }

    #[test]
    fn test_args_reconnect_and_timeout() {
        let args = FfmpegTranscoder::default()
            .connect_timeout(Duration::from_secs(30))
            .reconnect_delay_max(Duration::from_secs(10))
            .args(&request(StreamProfile::RawPcm));

        assert_eq!(&args[..4], &["-reconnect", "1", "-reconnect_streamed", "1"]);
        let timeout = args.iter().position(|a| a == "-timeout").unwrap();
        assert_eq!(args[timeout + 1], "30000000");
        let delay = args.iter().position(|a| a == "-reconnect_delay_max").unwrap();
        assert_eq!(args[delay + 1], "10");
    }

    #[test]
    fn test_args_end_with_profile_output() {
        let args = FfmpegTranscoder::default().args(&request(StreamProfile::RawPcm));
        let input = args.iter().position(|a| a == "-i").unwrap();
        let tail: Vec<&str> = args[input + 2..].iter().map(String::as_str).collect();
        assert_eq!(tail, StreamProfile::RawPcm.output_args());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_start() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/radio-relay-ffmpeg");
        let result = transcoder.start(request(StreamProfile::RawPcm)).await;
        assert!(result.is_err());
    }
}
