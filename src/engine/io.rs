//! WAV file I/O
//!
//! Offline counterpart of the live rendering boundary: files are read into a
//! [`StereoBuffer`], pushed through a [`RenderGraph`] in callback-sized
//! chunks, and written back out.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::buffer::StereoBuffer;
use super::graph::RenderGraph;
use crate::error::{Result, StereofixError};

/// Output sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub bit_depth: u16,
}

impl WavFormat {
    pub fn new(sample_rate: u32, bit_depth: u16) -> Self {
        Self {
            sample_rate,
            bit_depth,
        }
    }
}

/// Audio read from disk, with the rate it was recorded at
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub buffer: StereoBuffer,
    pub format: WavFormat,
    pub source_channels: u16,
}

/// Read a mono or stereo WAV file
///
/// # Errors
/// * `Wav` - If the file cannot be opened or decoded
/// * `UnsupportedChannels` - If the file has more than two channels
/// * `UnsupportedFormat` - If the integer bit depth is not 8, 16, 24 or 32
pub fn read_wav(path: &Path) -> Result<DecodedAudio> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels > 2 {
        return Err(StereofixError::UnsupportedChannels {
            channels: spec.channels,
        });
    }

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = StereoBuffer::from_interleaved(&samples, spec.channels)?;
    debug!(
        path = %path.display(),
        frames = buffer.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        "read wav"
    );

    Ok(DecodedAudio {
        buffer,
        format: WavFormat::new(spec.sample_rate, spec.bits_per_sample),
        source_channels: spec.channels,
    })
}

/// Write a stereo WAV file (16/24-bit integer or 32-bit float)
pub fn write_wav(path: &Path, buffer: &StereoBuffer, format: WavFormat) -> Result<()> {
    let sample_format = match format.bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => {
            return Err(StereofixError::UnsupportedFormat {
                format: format!("{other}-bit output (only 16, 24, 32 supported)"),
            })
        }
    };
    let spec = WavSpec {
        channels: 2,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bit_depth,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in buffer.to_interleaved() {
        match format.bit_depth {
            16 => writer.write_sample((sample * 32767.0).clamp(-32768.0, 32767.0) as i16)?,
            24 => writer.write_sample((sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32)?,
            _ => writer.write_sample(sample)?,
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Run a whole buffer through `graph` in place
pub fn render_buffer(graph: &mut RenderGraph, buffer: &mut StereoBuffer) {
    let (left, right) = buffer.channels_mut();
    graph.render(left, right);
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples: Vec<f32> = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        // 24-bit is delivered as i32
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits) => {
            return Err(StereofixError::UnsupportedFormat {
                format: format!("{bits}-bit integer audio"),
            })
        }
    };
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StereoMode;
    use crate::dsp::StereoMixStage;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let buffer = StereoBuffer::from_channels(vec![0.5, -0.25, 0.0], vec![0.1, 0.2, -0.3]);

        write_wav(&path, &buffer, WavFormat::new(44100, 32)).unwrap();
        let decoded = read_wav(&path).unwrap();

        assert_eq!(decoded.format.sample_rate, 44100);
        assert_eq!(decoded.buffer, buffer);
    }

    #[test]
    fn test_round_trip_16bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let buffer = StereoBuffer::from_channels(vec![0.5, -0.5], vec![0.25, 1.0]);

        write_wav(&path, &buffer, WavFormat::new(48000, 16)).unwrap();
        let decoded = read_wav(&path).unwrap();

        for (a, b) in decoded.buffer.to_interleaved().iter().zip(buffer.to_interleaved()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_mono_file_is_upmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.1_f32, 0.2, 0.3] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = read_wav(&path).unwrap();
        assert_eq!(decoded.source_channels, 1);
        assert_eq!(decoded.buffer.left(), decoded.buffer.right());
        assert_eq!(decoded.buffer.len(), 3);
    }

    #[test]
    fn test_unsupported_output_depth() {
        let dir = tempdir().unwrap();
        let err = write_wav(
            &dir.path().join("bad.wav"),
            &StereoBuffer::new(4),
            WavFormat::new(48000, 12),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_render_buffer() {
        let mut graph = RenderGraph::new(48000, 2);
        graph.push(Box::new(StereoMixStage::new(StereoMode::Left)));
        let mut buffer = StereoBuffer::from_channels(vec![0.1, 0.2, 0.3], vec![0.9, 0.8, 0.7]);

        render_buffer(&mut graph, &mut buffer);
        assert_eq!(buffer.right(), &[0.1, 0.2, 0.3]);
    }
}
