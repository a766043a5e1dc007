//! Render graph construction
//!
//! A [`RenderGraph`] is a fixed chain of stages built once per binding:
//!
//! ```text
//! source -> [isolation -> [high-pass -> compressor]] -> stereo mix -> gain -> output
//! ```
//!
//! The bracketed parts depend on the configuration and on the isolation
//! variant actually selected. Reconfiguring means building a new graph.

use std::sync::Arc;

use serde::Serialize;

use super::buffer::{BASIC_BLOCK_SIZE, SPECTRAL_BLOCK_SIZE};
use crate::config::{AudioConfiguration, StereoMode, VocalIsolationVariant};
use crate::dsp::signal::sanitize;
use crate::dsp::{
    CompressorParams, CompressorStage, GainControl, GainStage, HighPassStage, Stage, StageKind,
    StereoBlock, StereoMixStage, VOCAL_HIGH_PASS_HZ,
};
use crate::isolation::{IsolationAlgorithm, IsolationStage, VocalIsolationStrategy};

// ============================================================================
// Render Graph
// ============================================================================

/// Serializable description of a built graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub sample_rate: u32,
    pub block_size: usize,
    pub mode: StereoMode,
    pub isolation: Option<VocalIsolationVariant>,
    pub stages: Vec<StageKind>,
}

/// Ordered chain of stages driven by the platform's render callback
pub struct RenderGraph {
    stages: Vec<Box<dyn Stage>>,
    sample_rate: u32,
    block_size: usize,
    mode: StereoMode,
    isolation: Option<VocalIsolationVariant>,
}

impl RenderGraph {
    /// Empty graph; audio passes through unchanged apart from sanitizing
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            stages: Vec::new(),
            sample_rate,
            block_size: block_size.max(1),
            mode: StereoMode::default(),
            isolation: None,
        }
    }

    pub fn passthrough(sample_rate: u32) -> Self {
        Self::new(sample_rate, BASIC_BLOCK_SIZE)
    }

    /// Append a stage, preparing it for this graph's format
    pub fn push(&mut self, mut stage: Box<dyn Stage>) {
        stage.prepare(self.sample_rate, self.block_size);
        self.stages.push(stage);
    }

    /// Render callback.
    ///
    /// Processes `left`/`right` in place, in chunks of at most the graph's
    /// block size. Runs on the real-time thread.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);

        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample = sanitize(*sample);
        }

        for (l, r) in left
            .chunks_mut(self.block_size)
            .zip(right.chunks_mut(self.block_size))
        {
            let mut block = StereoBlock::new(l, r);
            for stage in &mut self.stages {
                stage.process(&mut block);
            }
        }
    }

    /// Clear all stage state
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn topology(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            mode: self.mode,
            isolation: self.isolation,
            stages: self.topology(),
        }
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .field("stages", &self.topology())
            .finish()
    }
}

// ============================================================================
// Graph Builder
// ============================================================================

/// Builds render graphs for a configuration
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    strategy: Arc<VocalIsolationStrategy>,
}

impl GraphBuilder {
    pub fn new(strategy: Arc<VocalIsolationStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &Arc<VocalIsolationStrategy> {
        &self.strategy
    }

    /// Build the graph for `config`, with `gain` as its output volume
    pub fn build(
        &self,
        config: &AudioConfiguration,
        gain: Arc<GainControl>,
        sample_rate: u32,
    ) -> RenderGraph {
        let algorithm = config
            .vocal_isolation_enabled
            .then(|| self.strategy.resolve(config.vocal_isolation_variant));

        let block_size = match algorithm {
            Some(IsolationAlgorithm::Spectral(_)) => SPECTRAL_BLOCK_SIZE,
            _ => BASIC_BLOCK_SIZE,
        };

        let mut graph = RenderGraph::new(sample_rate, block_size);
        graph.mode = config.mode;

        if let Some(algorithm) = algorithm {
            let variant = algorithm.variant();
            graph.isolation = Some(variant);
            graph.push(Box::new(IsolationStage::new(
                algorithm,
                self.strategy.faults().clone(),
            )));

            if variant.uses_dynamics() {
                graph.push(Box::new(HighPassStage::new(VOCAL_HIGH_PASS_HZ)));
                graph.push(Box::new(CompressorStage::new(CompressorParams::VOCAL)));
            }
        }

        graph.push(Box::new(StereoMixStage::new(config.mode)));
        graph.push(Box::new(GainStage::new(gain)));
        graph
    }
}
