//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::{AudioConfiguration, ExtensionSettings};
use crate::dsp::GainControl;
use crate::engine::{read_wav, render_buffer, write_wav, GraphBuilder, GraphSummary, WavFormat};
use crate::error::Result;
use crate::isolation::{FaultLog, MidSideModel, SpectralModelSlot, VocalIsolationStrategy};

/// Arguments of the `render` command
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: Option<String>,
    pub music_removal: bool,
    pub variant: Option<String>,
    pub settings: Option<PathBuf>,
    pub bit_depth: u16,
}

/// What `render` did
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub frames: usize,
    pub source_channels: u16,
    pub graph: GraphSummary,
    pub input_peak: f32,
    pub output_peak: f32,
}

/// Output of the `resolve` command
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    pub enabled: bool,
    pub configuration: AudioConfiguration,
    pub graph: GraphSummary,
}

/// Read a settings document from disk.
pub fn load_settings(path: &Path) -> Result<ExtensionSettings> {
    let json = std::fs::read_to_string(path)?;
    Ok(ExtensionSettings::from_json(&json)?)
}

/// Builder used for offline work; the built-in spectral model is always loaded.
fn offline_builder() -> GraphBuilder {
    GraphBuilder::new(Arc::new(VocalIsolationStrategy::new(
        Arc::new(SpectralModelSlot::ready(Arc::new(MidSideModel))),
        Arc::new(FaultLog::default()),
    )))
}

/// Merge command-line flags over an optional settings document.
fn request_settings(request: &RenderRequest) -> Result<ExtensionSettings> {
    let mut settings = match &request.settings {
        Some(path) => load_settings(path)?,
        None => ExtensionSettings::default(),
    };
    if request.mode.is_some() {
        settings.mode = request.mode.clone();
    }
    if request.variant.is_some() {
        settings.vocal_isolation_variant = request.variant.clone();
    }
    settings.music_removal |= request.music_removal;
    Ok(settings)
}

/// Render a WAV file through the graph for the requested configuration.
pub fn render(request: &RenderRequest) -> Result<RenderReport> {
    let config = request_settings(request)?.audio_configuration()?;
    info!(
        input = %request.input.display(),
        mode = %config.mode,
        vocal_isolation = config.vocal_isolation_enabled,
        variant = %config.vocal_isolation_variant,
        "rendering"
    );

    let decoded = read_wav(&request.input)?;
    let sample_rate = decoded.format.sample_rate;
    let mut buffer = decoded.buffer;
    let input_peak = buffer.peak();

    let mut graph = offline_builder().build(&config, GainControl::shared(1.0), sample_rate);
    render_buffer(&mut graph, &mut buffer);

    write_wav(
        &request.output,
        &buffer,
        WavFormat::new(sample_rate, request.bit_depth),
    )?;

    let report = RenderReport {
        frames: buffer.len(),
        source_channels: decoded.source_channels,
        graph: graph.summary(),
        input_peak,
        output_peak: buffer.peak(),
    };
    info!(output = %request.output.display(), frames = report.frames, "render complete");
    println!("Rendered {} frames to {}", report.frames, request.output.display());
    println!("Stages: {:?}", report.graph.stages);

    Ok(report)
}

/// Resolve a settings document into its configuration and graph topology.
pub fn resolve(path: &Path, sample_rate: u32) -> Result<ResolvedSettings> {
    let settings = load_settings(path)?;
    let configuration = settings.audio_configuration()?;
    let graph = offline_builder()
        .build(&configuration, GainControl::shared(1.0), sample_rate)
        .summary();

    let resolved = ResolvedSettings {
        enabled: settings.enabled,
        configuration,
        graph,
    };
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StereoMode, VocalIsolationVariant};
    use crate::engine::{StageKind, StereoBuffer};
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "enabled": true, "mode": "left" }"#).unwrap();

        let request = RenderRequest {
            settings: Some(path),
            mode: Some("right".to_string()),
            music_removal: true,
            variant: Some("basic".to_string()),
            ..RenderRequest::default()
        };
        let config = request_settings(&request).unwrap().audio_configuration().unwrap();

        assert_eq!(
            config,
            AudioConfiguration::with_isolation(StereoMode::Right, VocalIsolationVariant::Basic)
        );
    }

    #[test]
    fn test_render_average() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let source = StereoBuffer::from_channels(vec![1.0, 0.0, -1.0], vec![1.0, 0.0, 1.0]);
        write_wav(&input, &source, WavFormat::new(48000, 32)).unwrap();

        let report = render(&RenderRequest {
            input,
            output: output.clone(),
            bit_depth: 32,
            ..RenderRequest::default()
        })
        .unwrap();

        assert_eq!(report.graph.stages, vec![StageKind::StereoMix, StageKind::Gain]);
        let rendered = read_wav(&output).unwrap().buffer;
        assert_eq!(rendered.left(), &[1.0, 0.0, 0.0]);
        assert_eq!(rendered.right(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resolve_reports_topology() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "spectral" }"#,
        )
        .unwrap();

        let resolved = resolve(&path, 44100).unwrap();
        assert!(resolved.enabled);
        assert_eq!(resolved.graph.isolation, Some(VocalIsolationVariant::Spectral));
        assert_eq!(resolved.graph.block_size, 2048);
        assert_eq!(resolved.graph.stages.len(), 5);
    }

    #[test]
    fn test_missing_settings_file() {
        let dir = tempdir().unwrap();
        let err = resolve(&dir.path().join("absent.json"), 48000).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
