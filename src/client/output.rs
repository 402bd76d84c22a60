//! Destinations for decoded PCM

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Receives volume-scaled, frame-aligned s16le stereo PCM
#[async_trait]
pub trait PcmOutput: Send + Sync + 'static {
    async fn write(&self, pcm: Bytes) -> std::io::Result<()>;
}

/// Writes PCM to stdout, e.g. for piping into `aplay -f S16_LE -r 48000 -c 2`
pub struct StdoutOutput {
    stdout: tokio::sync::Mutex<tokio::io::Stdout>,
}

impl StdoutOutput {
    pub fn new() -> Self {
        Self {
            stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PcmOutput for StdoutOutput {
    async fn write(&self, pcm: Bytes) -> std::io::Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(&pcm).await?;
        stdout.flush().await
    }
}

/// Forwards PCM to a channel
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelOutput {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PcmOutput for ChannelOutput {
    async fn write(&self, pcm: Bytes) -> std::io::Result<()> {
        self.tx
            .send(pcm)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pcm receiver closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_output() {
        let (output, mut rx) = ChannelOutput::new(2);
        output.write(Bytes::from_static(&[1, 2, 3, 4])).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(&[1, 2, 3, 4]));

        drop(rx);
        let err = output.write(Bytes::from_static(&[0; 4])).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
