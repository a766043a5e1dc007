//! DSP stages
//!
//! Per-sample signal math plus the stages a render graph is built from.
//! Every stage implements [`Stage`] for uniform, allocation-free processing.

mod compressor;
mod filter;
mod gain;
mod mix;
pub mod signal;
mod stage;

pub use compressor::{CompressorParams, CompressorStage};
pub use filter::{HighPassStage, VOCAL_HIGH_PASS_HZ};
pub use gain::{GainControl, GainStage};
pub use mix::StereoMixStage;
pub use signal::SampleFrame;
pub use stage::{Stage, StageKind, StereoBlock};
