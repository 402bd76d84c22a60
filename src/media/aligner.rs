//! Frame alignment of arbitrary reads
//!
//! Pipes and sockets return whatever byte counts they like. PCM consumers
//! need every chunk to hold whole frames, otherwise the left and right
//! channels (or the two bytes of one sample) swap places for the rest of
//! the stream. The aligner keeps the incomplete tail of each read and
//! prepends it to the next one.

use bytes::{Bytes, BytesMut};

/// Repacks a byte stream into frame-aligned chunks
#[derive(Debug)]
pub struct FrameAligner {
    /// Frame size, or `None` for passthrough
    frame_size: Option<usize>,
    /// Bytes carried over from the previous read (always < frame_size)
    residue: BytesMut,
}

impl FrameAligner {
    /// Create an aligner for the given frame size
    ///
    /// `None` (or a frame size of 0 or 1) forwards data unchanged.
    pub fn new(frame_size: Option<usize>) -> Self {
        let frame_size = frame_size.filter(|&size| size > 1);
        Self {
            frame_size,
            residue: BytesMut::with_capacity(frame_size.unwrap_or(0)),
        }
    }

    /// Create a passthrough aligner
    pub fn passthrough() -> Self {
        Self::new(None)
    }

    /// Feed one read, returning the aligned chunk if there is one
    pub fn push(&mut self, data: &[u8]) -> Option<Bytes> {
        self.push_mut(data).map(BytesMut::freeze)
    }

    /// Like [`push`](Self::push) but hands back a mutable buffer so the
    /// caller can rewrite samples in place
    pub fn push_mut(&mut self, data: &[u8]) -> Option<BytesMut> {
        let Some(frame_size) = self.frame_size else {
            if data.is_empty() {
                return None;
            }
            return Some(BytesMut::from(data));
        };

        self.residue.extend_from_slice(data);

        let aligned = (self.residue.len() / frame_size) * frame_size;
        if aligned == 0 {
            return None;
        }

        Some(self.residue.split_to(aligned))
    }

    /// Number of bytes waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.residue.len()
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.residue.clear();
    }
}
