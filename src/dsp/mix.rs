//! Stereo mix stage

use super::signal::stereo_mix;
use super::stage::{Stage, StageKind, StereoBlock};
use crate::config::StereoMode;

/// Folds the two channels according to a [`StereoMode`]
#[derive(Debug, Clone)]
pub struct StereoMixStage {
    mode: StereoMode,
}

impl StereoMixStage {
    pub fn new(mode: StereoMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> StereoMode {
        self.mode
    }
}

impl Stage for StereoMixStage {
    fn process(&mut self, block: &mut StereoBlock<'_>) {
        for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
            let frame = stereo_mix(self.mode, *l, *r);
            *l = frame.left;
            *r = frame.right;
        }
    }

    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {}

    fn reset(&mut self) {}

    fn kind(&self) -> StageKind {
        StageKind::StereoMix
    }
}
