//! Stage trait definition
//!
//! Base trait for every node in a render graph. Stages run on the
//! real-time thread: `process` must not block, lock, log or allocate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mutable view over one block of planar stereo audio
pub struct StereoBlock<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

impl<'a> StereoBlock<'a> {
    /// Both slices must have the same length
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self { left, right }
    }

    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifies a stage in a graph topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Isolation,
    HighPass,
    Compressor,
    StereoMix,
    Gain,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Isolation => "isolation",
            StageKind::HighPass => "high_pass",
            StageKind::Compressor => "compressor",
            StageKind::StereoMix => "stereo_mix",
            StageKind::Gain => "gain",
        };
        f.write_str(name)
    }
}

/// A processing node in a render graph
pub trait Stage: Send {
    /// Process one block in place
    fn process(&mut self, block: &mut StereoBlock<'_>);

    /// Called once before the first block, and whenever the sample rate
    /// or block size changes
    fn prepare(&mut self, sample_rate: u32, max_block_size: usize);

    /// Clear internal state (filter history, envelopes)
    fn reset(&mut self);

    fn kind(&self) -> StageKind;
}
