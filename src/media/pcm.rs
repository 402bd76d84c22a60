//! In-place volume scaling for s16le PCM

use bytes::Bytes;

use super::aligner::FrameAligner;
use super::profile::PCM_FRAME_SIZE;

/// Scales interleaved s16le samples by a volume factor
///
/// Uses the same residual-buffer technique as the producer so that a
/// sample is never split across two calls.
#[derive(Debug)]
pub struct PcmVolume {
    aligner: FrameAligner,
}

impl PcmVolume {
    pub fn new() -> Self {
        Self {
            aligner: FrameAligner::new(Some(PCM_FRAME_SIZE)),
        }
    }

    /// Align `data` and scale every sample by `volume` (0.0..=1.0)
    pub fn process(&mut self, data: &[u8], volume: f64) -> Option<Bytes> {
        let mut chunk = self.aligner.push_mut(data)?;
        scale_samples(&mut chunk, volume);
        Some(chunk.freeze())
    }

    /// Bytes held back waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.aligner.pending()
    }

    pub fn reset(&mut self) {
        self.aligner.reset();
    }
}

impl Default for PcmVolume {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale little-endian i16 samples in place
pub fn scale_samples(data: &mut [u8], volume: f64) {
    if volume >= 1.0 {
        return;
    }
    let volume = volume.max(0.0);

    for sample in data.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        let scaled = (value as f64 * volume) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn decode(data: &[u8]) -> Vec<i16> {
        data.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_half_volume() {
        let mut volume = PcmVolume::new();
        let out = volume
            .process(&samples(&[1000, -1000, 32767, -32768]), 0.5)
            .unwrap();
        assert_eq!(decode(&out), vec![500, -500, 16383, -16384]);
    }

    #[test]
    fn test_zero_volume_silences() {
        let mut volume = PcmVolume::new();
        let out = volume.process(&samples(&[1234, -4321]), 0.0).unwrap();
        assert_eq!(decode(&out), vec![0, 0]);
    }

    #[test]
    fn test_full_volume_is_identity() {
        let mut volume = PcmVolume::new();
        let input = samples(&[1, -2, 3, -4]);
        let out = volume.process(&input, 1.0).unwrap();
        assert_eq!(&out[..], &input[..]);
    }

    #[test]
    fn test_split_sample_is_scaled_whole() {
        let mut volume = PcmVolume::new();
        let input = samples(&[2000, 4000, -2000, -4000]);

        // Break in the middle of the third sample
        let first = volume.process(&input[..5], 0.5).unwrap();
        assert_eq!(decode(&first), vec![1000, 2000]);
        assert_eq!(volume.pending(), 1);

        let second = volume.process(&input[5..], 0.5).unwrap();
        assert_eq!(decode(&second), vec![-1000, -2000]);
        assert_eq!(volume.pending(), 0);
    }
}
