//! Vocal isolation
//!
//! This module provides:
//! - `VocalIsolationStrategy` for capability-checked variant selection
//! - `IsolationStage`, the render-graph node running the selected algorithm
//! - The spectral model interface, its load slot and fault reporting

mod spectral;
mod stage;
mod strategy;

pub use spectral::{FaultLog, MidSideModel, SpectralModel, SpectralModelSlot};
pub use stage::IsolationStage;
pub use strategy::{select, IsolationAlgorithm, VocalIsolationStrategy, SPECTRAL_FALLBACK};
