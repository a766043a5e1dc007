//! Audio Engine Module
//!
//! Core of the interception pipeline:
//! - Stereo buffer handling at the rendering boundary
//! - Render graph construction
//! - Shared rendering context lifecycle
//! - WAV file I/O for offline rendering

pub mod buffer;
pub mod graph;
pub mod io;
pub mod lifecycle;

pub use crate::dsp::StageKind;
pub use buffer::{StereoBuffer, BASIC_BLOCK_SIZE, SPECTRAL_BLOCK_SIZE};
pub use graph::{GraphBuilder, GraphSummary, RenderGraph};
pub use io::{read_wav, render_buffer, write_wav, DecodedAudio, WavFormat};
pub use lifecycle::{
    InteractionKind, LifecycleManager, LifecycleState, RenderingContextHandle, ResumeOutcome,
    WeakContextHandle,
};
