//! Stereo buffer
//!
//! Planar two-channel sample storage used at the rendering boundary and by
//! the offline renderer. Output is always stereo: mono input is duplicated
//! onto both channels, anything wider is rejected.

use crate::error::{Result, StereofixError};

// ============================================================================
// Constants
// ============================================================================

/// Callback size of the basic and enhanced pipelines (frames)
pub const BASIC_BLOCK_SIZE: usize = 4096;

/// Callback size of the spectral pipeline (frames)
pub const SPECTRAL_BLOCK_SIZE: usize = 2048;

/// Planar stereo buffer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StereoBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBuffer {
    /// Silent buffer of `frames` frames
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Build from two channels; the longer one is truncated
    pub fn from_channels(mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let frames = left.len().min(right.len());
        left.truncate(frames);
        right.truncate(frames);
        Self { left, right }
    }

    /// Build from planar channel data (1 or 2 channels)
    pub fn from_planar(mut channels: Vec<Vec<f32>>) -> Result<Self> {
        match channels.len() {
            1 => {
                let mono = channels.remove(0);
                Ok(Self::from_channels(mono.clone(), mono))
            }
            2 => {
                let right = channels.remove(1);
                let left = channels.remove(0);
                Ok(Self::from_channels(left, right))
            }
            n => Err(StereofixError::UnsupportedChannels { channels: n as u16 }),
        }
    }

    /// Build from interleaved samples
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channels: u16) -> Result<Self> {
        match channels {
            1 => Ok(Self::from_channels(samples.to_vec(), samples.to_vec())),
            2 => {
                let (left, right) = samples
                    .chunks_exact(2)
                    .map(|frame| (frame[0], frame[1]))
                    .unzip();
                Ok(Self { left, right })
            }
            n => Err(StereofixError::UnsupportedChannels { channels: n }),
        }
    }

    /// Interleave back to L R L R ...
    pub fn to_interleaved(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .flat_map(|(&l, &r)| [l, r])
            .collect()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn channels_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.left, &mut self.right)
    }

    /// Peak absolute sample across both channels
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interleaved_round_trip() {
        let samples = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = StereoBuffer::from_interleaved(&samples, 2).unwrap();

        assert_eq!(buffer.left(), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.right(), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), samples.to_vec());
    }

    #[test]
    fn test_mono_is_duplicated() {
        let buffer = StereoBuffer::from_interleaved(&[0.5, 0.25], 1).unwrap();
        assert_eq!(buffer.left(), buffer.right());
        assert_eq!(buffer.len(), 2);

        let buffer = StereoBuffer::from_planar(vec![vec![0.5, 0.25]]).unwrap();
        assert_eq!(buffer.right(), &[0.5, 0.25]);
    }

    #[test]
    fn test_multichannel_is_rejected() {
        let err = StereoBuffer::from_interleaved(&[0.0; 12], 6).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_CHANNELS");

        let err = StereoBuffer::from_planar(vec![vec![0.0]; 3]).unwrap_err();
        assert!(matches!(err, StereofixError::UnsupportedChannels { channels: 3 }));
    }

    #[test]
    fn test_partial_frame_dropped() {
        let buffer = StereoBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2).unwrap();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_peak() {
        let buffer = StereoBuffer::from_channels(vec![0.2, -0.9], vec![0.5, 0.1]);
        assert_eq!(buffer.peak(), 0.9);
    }
}
