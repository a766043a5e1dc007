//! Gain stage
//!
//! Output volume for a binding. The control side (volume interception) and
//! the render side share a [`GainControl`] that stores the linear gain as
//! atomic bits, so neither side ever waits on the other.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::stage::{Stage, StageKind, StereoBlock};

// ============================================================================
// Constants
// ============================================================================

/// Lowest accepted linear gain
const MIN_GAIN: f32 = 0.0;

/// Highest accepted linear gain (media volume range)
const MAX_GAIN: f32 = 1.0;

// ============================================================================
// Gain Control
// ============================================================================

/// Lock-free linear gain shared between the control and render domains
#[derive(Debug)]
pub struct GainControl {
    bits: AtomicU32,
}

impl GainControl {
    /// Create a control at the given linear gain, clamped to [0, 1]
    pub fn new(gain: f32) -> Self {
        Self {
            bits: AtomicU32::new(Self::normalize(gain).to_bits()),
        }
    }

    pub fn shared(gain: f32) -> Arc<Self> {
        Arc::new(Self::new(gain))
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Set the linear gain; non-finite values are treated as 0
    #[inline]
    pub fn set(&self, gain: f32) {
        self.bits
            .store(Self::normalize(gain).to_bits(), Ordering::Release);
    }

    fn normalize(gain: f32) -> f32 {
        if gain.is_finite() {
            gain.clamp(MIN_GAIN, MAX_GAIN)
        } else {
            MIN_GAIN
        }
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(MAX_GAIN)
    }
}

// ============================================================================
// Gain Stage
// ============================================================================

/// Applies the shared gain, read once per block
#[derive(Debug, Clone)]
pub struct GainStage {
    control: Arc<GainControl>,
}

impl GainStage {
    pub fn new(control: Arc<GainControl>) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &Arc<GainControl> {
        &self.control
    }
}

impl Stage for GainStage {
    fn process(&mut self, block: &mut StereoBlock<'_>) {
        let gain = self.control.get();

        // Unity gain optimization
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }

        for sample in block.left.iter_mut().chain(block.right.iter_mut()) {
            *sample *= gain;
        }
    }

    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {}

    fn reset(&mut self) {
        // Gain has no internal state to reset
    }

    fn kind(&self) -> StageKind {
        StageKind::Gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_control_clamps() {
        let control = GainControl::new(2.0);
        assert_eq!(control.get(), 1.0);

        control.set(-0.5);
        assert_eq!(control.get(), 0.0);

        control.set(f32::NAN);
        assert_eq!(control.get(), 0.0);
    }

    #[test]
    fn test_gain_process() {
        let control = GainControl::shared(0.5);
        let mut stage = GainStage::new(control.clone());
        let mut left = vec![1.0; 8];
        let mut right = vec![-1.0; 8];

        stage.process(&mut StereoBlock::new(&mut left, &mut right));
        assert!(left.iter().all(|&s| s == 0.5));
        assert!(right.iter().all(|&s| s == -0.5));

        // Changes are picked up on the next block
        control.set(0.0);
        stage.process(&mut StereoBlock::new(&mut left, &mut right));
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gain_process_unity() {
        let mut stage = GainStage::new(GainControl::shared(1.0));
        let mut left = vec![0.25; 4];
        let mut right = vec![0.75; 4];

        stage.process(&mut StereoBlock::new(&mut left, &mut right));

        assert_eq!(left, vec![0.25; 4]);
        assert_eq!(right, vec![0.75; 4]);
    }
}
