//! High-pass filter stage
//!
//! Second-order (biquad) high-pass used after vocal isolation to strip
//! residual bass and kick bleed.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::stage::{Stage, StageKind, StereoBlock};

/// Cutoff used by the isolation pipelines
pub const VOCAL_HIGH_PASS_HZ: f64 = 80.0;

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// High-pass coefficients from the Audio EQ Cookbook
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn high_pass(sample_rate: f64, frequency: f64, q: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        // No room for a 10 Hz corner: pass the signal through
        if nyquist <= 11.0 {
            return Self::pass_through();
        }
        // Keep the corner below Nyquist
        let freq = frequency.clamp(10.0, nyquist - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        BiquadCoeffs {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn pass_through() -> Self {
        BiquadCoeffs {
            b0: 1.0,
            ..Self::default()
        }
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stereo high-pass filter
#[derive(Debug, Clone)]
pub struct HighPassStage {
    cutoff_hz: f64,
    q: f64,
    coeffs: BiquadCoeffs,
    state: [BiquadState; 2],
}

impl HighPassStage {
    /// Butterworth (Q = 1/sqrt(2)) high-pass at the given cutoff
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            q: FRAC_1_SQRT_2,
            coeffs: BiquadCoeffs::default(),
            state: [BiquadState::default(); 2],
        }
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }
}

impl Default for HighPassStage {
    fn default() -> Self {
        Self::new(VOCAL_HIGH_PASS_HZ)
    }
}

impl Stage for HighPassStage {
    fn process(&mut self, block: &mut StereoBlock<'_>) {
        let coeffs = self.coeffs;
        let [left_state, right_state] = &mut self.state;
        for sample in block.left.iter_mut() {
            *sample = left_state.process(*sample as f64, &coeffs) as f32;
        }
        for sample in block.right.iter_mut() {
            *sample = right_state.process(*sample as f64, &coeffs) as f32;
        }
    }

    fn prepare(&mut self, sample_rate: u32, _max_block_size: usize) {
        self.coeffs = BiquadCoeffs::high_pass(sample_rate as f64, self.cutoff_hz, self.q);
        self.reset();
    }

    fn reset(&mut self) {
        for state in &mut self.state {
            state.reset();
        }
    }

    fn kind(&self) -> StageKind {
        StageKind::HighPass
    }
}
