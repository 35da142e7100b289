//! Live microphone input through cpal.
//!
//! The input callback mixes each frame to mono, converts it to an offset-binary
//! code and pushes it into the capture channel. The device clock paces the
//! conversion, so no extra thread is needed.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use tracing::{info, warn};

use super::dma::CaptureFeeder;
use super::source::to_offset_binary;
use crate::error::{PipelineError, Result};
use crate::params::capture_constants::FEED_CHUNK;

/// Open input stream; capture stops when dropped
pub struct MicSource {
    _stream: cpal::Stream,
    label: String,
    sample_rate_hz: u32,
}

impl MicSource {
    /// Open the default input device at `sample_rate_hz` if it supports it
    pub fn start<const N: usize>(feeder: CaptureFeeder<N>, sample_rate_hz: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| PipelineError::Source("no default input device".to_string()))?;
        let label = device.name().unwrap_or_else(|_| "mic".into());

        let default = device
            .default_input_config()
            .map_err(|e| PipelineError::Source(format!("input config: {}", e)))?;
        let format = default.sample_format();
        let mut config = default.config();
        if config.sample_rate.0 != sample_rate_hz {
            warn!(
                device_hz = config.sample_rate.0,
                requested_hz = sample_rate_hz,
                "requesting non-default input rate"
            );
            config.sample_rate.0 = sample_rate_hz;
        }

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32, N>(&device, &config, feeder)?,
            SampleFormat::I16 => build_stream::<i16, N>(&device, &config, feeder)?,
            SampleFormat::U16 => build_stream::<u16, N>(&device, &config, feeder)?,
            other => {
                return Err(PipelineError::Source(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };
        stream
            .play()
            .map_err(|e| PipelineError::Source(format!("start input stream: {}", e)))?;

        info!(device = %label, sample_rate_hz, channels = config.channels, "microphone capture started");
        Ok(Self {
            _stream: stream,
            label,
            sample_rate_hz,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

fn build_stream<T, const N: usize>(
    device: &Device,
    config: &StreamConfig,
    feeder: CaptureFeeder<N>,
) -> Result<cpal::Stream>
where
    T: Sample + SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let mut chunk = Vec::with_capacity(FEED_CHUNK);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks_exact(channels) {
                    let mono = frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>()
                        / channels as f32;
                    chunk.push(to_offset_binary(mono));
                    if chunk.len() == FEED_CHUNK {
                        feeder.convert(&chunk);
                        chunk.clear();
                    }
                }
            },
            |err| warn!("input stream error: {}", err),
            None,
        )
        .map_err(|e| PipelineError::Source(format!("build input stream: {}", e)))
}
