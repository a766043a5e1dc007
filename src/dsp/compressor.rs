//! Compressor stage
//!
//! A dynamics processor that evens out the loudness of the isolated vocal.
//! Feed-forward design with linked stereo peak detection, a quadratic soft
//! knee and one-pole attack/release smoothing of the gain. With auto makeup
//! the output is lifted by `(1 / g)^0.6`, where `g` is the static curve's
//! gain for a full-scale input.

use serde::{Deserialize, Serialize};

use super::stage::{Stage, StageKind, StereoBlock};

/// Compressor parameters, in the units of a platform dynamics node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB (-100 to 0 dB)
    pub threshold_db: f32,
    /// Knee width in dB (0 = hard knee, up to 40 dB)
    pub knee_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in seconds (0 to 1)
    pub attack_secs: f32,
    /// Release time in seconds (0 to 1)
    pub release_secs: f32,
    /// Enable automatic makeup gain calculation
    pub auto_makeup: bool,
}

impl CompressorParams {
    /// Settings used after vocal isolation
    pub const VOCAL: CompressorParams = CompressorParams {
        threshold_db: -24.0,
        knee_db: 30.0,
        ratio: 12.0,
        attack_secs: 0.003,
        release_secs: 0.25,
        auto_makeup: true,
    };

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-100.0, 0.0);
        self.knee_db = self.knee_db.clamp(0.0, 40.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_secs = self.attack_secs.clamp(0.0, 1.0);
        self.release_secs = self.release_secs.clamp(0.0, 1.0);
    }
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self::VOCAL
    }
}

/// Compressor dynamics stage
#[derive(Debug, Clone)]
pub struct CompressorStage {
    params: CompressorParams,
    sample_rate: u32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current smoothed gain (linear, 1.0 = no reduction)
    gain: f32,
    /// Output makeup (linear)
    makeup: f32,
}

impl CompressorStage {
    pub fn new(mut params: CompressorParams) -> Self {
        params.clamp();
        let mut stage = Self {
            params,
            sample_rate: 48000,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain: 1.0,
            makeup: 1.0,
        };
        stage.update_coefficients();
        stage.makeup = stage.calculate_auto_makeup();
        stage
    }

    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Current gain reduction in dB, for metering
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    /// Makeup applied to the output, in dB
    pub fn makeup_db(&self) -> f32 {
        linear_to_db(self.makeup)
    }

    /// Auto makeup from the gain at 0 dBFS: (1 / full_range_gain)^0.6
    fn calculate_auto_makeup(&self) -> f32 {
        if !self.params.auto_makeup {
            return 1.0;
        }
        let full_range_gain = db_to_linear(self.compute_gain_reduction_db(0.0));
        (1.0 / full_range_gain).powf(0.6)
    }

    /// One-pole smoothing coefficients: coeff = exp(-1 / time_in_samples)
    fn update_coefficients(&mut self) {
        let rate = self.sample_rate as f32;
        let coeff = |secs: f32| {
            let samples = secs * rate;
            if samples > 0.0 {
                (-1.0 / samples).exp()
            } else {
                0.0
            }
        };
        self.attack_coeff = coeff(self.params.attack_secs);
        self.release_coeff = coeff(self.params.release_secs);
    }

    /// Static curve: gain change in dB (<= 0) for an input level in dB
    fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.params.threshold_db;
        let ratio = self.params.ratio;
        let knee = self.params.knee_db;
        let over = input_db - threshold;

        let output_db = if 2.0 * over < -knee {
            input_db
        } else if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee)
        } else {
            threshold + over / ratio
        };

        output_db - input_db
    }
}

impl Default for CompressorStage {
    fn default() -> Self {
        Self::new(CompressorParams::VOCAL)
    }
}

impl Stage for CompressorStage {
    fn process(&mut self, block: &mut StereoBlock<'_>) {
        for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
            // Linked detection: the louder channel drives both
            let level = l.abs().max(r.abs());
            let target = db_to_linear(self.compute_gain_reduction_db(linear_to_db(level)));

            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;

            let gain = self.gain * self.makeup;
            *l *= gain;
            *r *= gain;
        }
    }

    fn prepare(&mut self, sample_rate: u32, _max_block_size: usize) {
        self.sample_rate = sample_rate.max(1);
        self.update_coefficients();
        self.reset();
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn kind(&self) -> StageKind {
        StageKind::Compressor
    }
}

#[inline]
fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        -120.0
    }
}

#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
