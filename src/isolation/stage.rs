//! Isolation stage
//!
//! Replaces both channels with the vocal estimate of the selected algorithm.
//! A spectral model failure on one buffer is absorbed here: that buffer is
//! processed with the basic algorithm and the fault is counted, and the next
//! buffer tries the model again.

use std::sync::Arc;

use super::spectral::FaultLog;
use super::strategy::IsolationAlgorithm;
use crate::dsp::signal::{hard_clip, sanitize, vocal_basic, vocal_enhanced};
use crate::dsp::{Stage, StageKind, StereoBlock};

pub struct IsolationStage {
    algorithm: IsolationAlgorithm,
    faults: Arc<FaultLog>,
    /// Model output, sized in `prepare` so the render path never allocates
    scratch: Vec<f32>,
}

impl IsolationStage {
    pub fn new(algorithm: IsolationAlgorithm, faults: Arc<FaultLog>) -> Self {
        Self {
            algorithm,
            faults,
            scratch: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> &IsolationAlgorithm {
        &self.algorithm
    }

    fn apply_basic(left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let frame = vocal_basic(*l, *r);
            *l = frame.left;
            *r = frame.right;
        }
    }

    fn apply_enhanced(left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let frame = vocal_enhanced(*l, *r);
            *l = frame.left;
            *r = frame.right;
        }
    }
}

impl Stage for IsolationStage {
    fn process(&mut self, block: &mut StereoBlock<'_>) {
        let model = match &self.algorithm {
            IsolationAlgorithm::Basic => return Self::apply_basic(block.left, block.right),
            IsolationAlgorithm::Enhanced => return Self::apply_enhanced(block.left, block.right),
            IsolationAlgorithm::Spectral(model) => model,
        };

        let chunk = self.scratch.len();
        if chunk == 0 {
            // Not prepared: no scratch to run the model into
            return Self::apply_basic(block.left, block.right);
        }

        for (left, right) in block
            .left
            .chunks_mut(chunk)
            .zip(block.right.chunks_mut(chunk))
        {
            let out = &mut self.scratch[..left.len()];
            match model.isolate(left, right, out) {
                Ok(()) => {
                    for ((l, r), &v) in left.iter_mut().zip(right.iter_mut()).zip(out.iter()) {
                        let v = hard_clip(sanitize(v));
                        *l = v;
                        *r = v;
                    }
                }
                Err(_) => {
                    self.faults.record();
                    Self::apply_basic(left, right);
                }
            }
        }
    }

    fn prepare(&mut self, _sample_rate: u32, max_block_size: usize) {
        if let IsolationAlgorithm::Spectral(_) = self.algorithm {
            self.scratch.resize(max_block_size.max(1), 0.0);
        }
    }

    fn reset(&mut self) {
        self.scratch.iter_mut().for_each(|s| *s = 0.0);
    }

    fn kind(&self) -> StageKind {
        StageKind::Isolation
    }
}
