//! Per-sample signal math
//!
//! Pure functions over one (left, right) frame. No state, no allocation;
//! safe to call from the render callback. Non-finite input samples are
//! treated as silence.

use serde::{Deserialize, Serialize};

use crate::config::StereoMode;

// ============================================================================
// Constants
// ============================================================================

/// Side-channel gain of the basic isolation variant
pub const BASIC_SIDE_GAIN: f32 = 2.0;

/// Side-channel gain of the enhanced isolation variant
pub const ENHANCED_SIDE_GAIN: f32 = 3.0;

/// Residual center level kept by the enhanced variant
pub const ENHANCED_CENTER_GAIN: f32 = 0.15;

/// Difference gain of the spectral reference model
pub const SPECTRAL_DIFF_GAIN: f32 = 2.5;

/// Residual average level kept by the spectral reference model
pub const SPECTRAL_AVERAGE_GAIN: f32 = 0.1;

/// Level above which the soft limiter starts compressing
pub const SOFT_LIMIT_THRESHOLD: f32 = 0.8;

/// Slope applied to the portion above the soft limit threshold
pub const SOFT_LIMIT_SLOPE: f32 = 0.2;

// ============================================================================
// Sample Frame
// ============================================================================

/// One stereo sample pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleFrame {
    pub left: f32,
    pub right: f32,
}

impl SampleFrame {
    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    #[inline]
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Map NaN and infinities to 0 so corruption never propagates
#[inline]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// Clamp to the nominal [-1, 1] range
#[inline]
pub fn hard_clip(sample: f32) -> f32 {
    sample.clamp(-1.0, 1.0)
}

/// Soft limiter used by the enhanced variant.
///
/// Identity within ±0.8; above that the excess is scaled by 0.2.
#[inline]
pub fn soft_limit(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude > SOFT_LIMIT_THRESHOLD {
        sample.signum() * (SOFT_LIMIT_THRESHOLD + (magnitude - SOFT_LIMIT_THRESHOLD) * SOFT_LIMIT_SLOPE)
    } else {
        sample
    }
}

// ============================================================================
// Stereo Mixing
// ============================================================================

#[inline]
pub fn stereo_left(left: f32, _right: f32) -> SampleFrame {
    SampleFrame::mono(sanitize(left))
}

#[inline]
pub fn stereo_right(_left: f32, right: f32) -> SampleFrame {
    SampleFrame::mono(sanitize(right))
}

/// Both outputs are the mean of the inputs, each computed on its own
/// summation path.
#[inline]
pub fn stereo_average(left: f32, right: f32) -> SampleFrame {
    let (l, r) = (sanitize(left), sanitize(right));
    let out_left = 0.5 * l + 0.5 * r;
    let out_right = 0.5 * l + 0.5 * r;
    SampleFrame::new(out_left, out_right)
}

/// Dispatch on the configured mode
#[inline]
pub fn stereo_mix(mode: StereoMode, left: f32, right: f32) -> SampleFrame {
    match mode {
        StereoMode::Left => stereo_left(left, right),
        StereoMode::Right => stereo_right(left, right),
        StereoMode::Average => stereo_average(left, right),
    }
}

// ============================================================================
// Vocal Isolation
// ============================================================================

/// Amplified channel difference, hard clipped
#[inline]
pub fn vocal_basic(left: f32, right: f32) -> SampleFrame {
    let (l, r) = (sanitize(left), sanitize(right));
    SampleFrame::mono(hard_clip(BASIC_SIDE_GAIN * (l - r)))
}

/// Side channel with a little center kept, soft limited then clipped
#[inline]
pub fn vocal_enhanced(left: f32, right: f32) -> SampleFrame {
    let (l, r) = (sanitize(left), sanitize(right));
    let center = 0.5 * (l + r);
    let side = 0.5 * (l - r);
    let raw = ENHANCED_SIDE_GAIN * side + ENHANCED_CENTER_GAIN * center;
    SampleFrame::mono(hard_clip(soft_limit(raw)))
}

/// Reference computation of the spectral variant
#[inline]
pub fn vocal_spectral(left: f32, right: f32) -> SampleFrame {
    let (l, r) = (sanitize(left), sanitize(right));
    let average = 0.5 * (l + r);
    let diff = l - r;
    let raw = SPECTRAL_DIFF_GAIN * diff + SPECTRAL_AVERAGE_GAIN * average;
    SampleFrame::mono(hard_clip(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    /// Grid of inputs across [-1, 1]
    fn grid() -> impl Iterator<Item = (f32, f32)> {
        let steps: Vec<f32> = (0..=20).map(|i| -1.0 + i as f32 * 0.1).collect();
        let pairs: Vec<(f32, f32)> = steps
            .iter()
            .flat_map(|&l| steps.iter().map(move |&r| (l, r)))
            .collect();
        pairs.into_iter()
    }

    #[test]
    fn test_stereo_left_right() {
        for (l, r) in grid() {
            assert_eq!(stereo_left(l, r), SampleFrame::new(l, l));
            assert_eq!(stereo_right(l, r), SampleFrame::new(r, r));
        }
    }

    #[test]
    fn test_stereo_average() {
        for (l, r) in grid() {
            let frame = stereo_average(l, r);
            assert_relative_eq!(frame.left, 0.5 * l + 0.5 * r);
            assert_eq!(frame.left, frame.right);
        }
    }

    #[test]
    fn test_vocal_basic_bounded() {
        for (l, r) in grid() {
            let frame = vocal_basic(l, r);
            assert!(frame.left.abs() <= 1.0);
            assert_eq!(frame.left, frame.right);
            assert_relative_eq!(frame.left, (2.0 * (l - r)).clamp(-1.0, 1.0));
        }
    }

    #[test_case(1.0, 1.0, 0.0 ; "identical channels cancel")]
    #[test_case(0.1, 0.0, 0.2 ; "small difference is doubled")]
    #[test_case(-1.0, 1.0, -1.0 ; "large difference clips")]
    fn test_vocal_basic_values(l: f32, r: f32, expected: f32) {
        assert_relative_eq!(vocal_basic(l, r).left, expected);
    }

    #[test]
    fn test_vocal_enhanced_values() {
        // center = 0.5, side = 0.1 -> raw = 0.3 + 0.075
        assert_relative_eq!(vocal_enhanced(0.6, 0.4).left, 0.375, epsilon = 1e-6);

        // center = 0, side = 0.5 -> raw = 1.5 -> 0.8 + 0.7 * 0.2 = 0.94
        assert_relative_eq!(vocal_enhanced(0.5, -0.5).left, 0.94, epsilon = 1e-6);

        // raw = 3.0 -> 1.24 -> clipped
        assert_eq!(vocal_enhanced(1.0, -1.0).left, 1.0);
        assert_eq!(vocal_enhanced(-1.0, 1.0).left, -1.0);
    }

    #[test]
    fn test_vocal_spectral_values() {
        // avg = 0.5, diff = 0.2 -> 0.5 + 0.05
        assert_relative_eq!(vocal_spectral(0.6, 0.4).left, 0.55, epsilon = 1e-6);
        assert_eq!(vocal_spectral(1.0, -1.0).left, 1.0);
    }

    #[test]
    fn test_soft_limit_identity_below_threshold() {
        for i in -80..=80 {
            let x = i as f32 / 100.0;
            assert_eq!(soft_limit(x), x);
            assert_eq!(soft_limit(soft_limit(x)), soft_limit(x));
        }
    }

    #[test]
    fn test_soft_limit_compresses_above_threshold() {
        assert_relative_eq!(soft_limit(1.8), 1.0, epsilon = 1e-6);
        assert_relative_eq!(soft_limit(-1.8), -1.0, epsilon = 1e-6);
        assert!(soft_limit(0.9) < 0.9);
    }

    #[test]
    fn test_non_finite_input_is_silence() {
        assert_eq!(vocal_basic(f32::NAN, 0.0), SampleFrame::mono(0.0));
        assert_eq!(vocal_enhanced(f32::INFINITY, 0.0), SampleFrame::mono(0.0));
        assert_eq!(vocal_spectral(0.0, f32::NEG_INFINITY), SampleFrame::mono(0.0));
        assert_eq!(stereo_average(f32::NAN, 0.5), SampleFrame::mono(0.25));
        assert_eq!(stereo_left(f32::NAN, 0.5), SampleFrame::mono(0.0));
    }

    #[test]
    fn test_stereo_mix_dispatch() {
        assert_eq!(stereo_mix(StereoMode::Left, 0.2, 0.4), SampleFrame::mono(0.2));
        assert_eq!(stereo_mix(StereoMode::Right, 0.2, 0.4), SampleFrame::mono(0.4));
        assert_relative_eq!(stereo_mix(StereoMode::Average, 0.2, 0.4).left, 0.3);
    }
}
