//! Sample sources standing in for the analog front end and converter.
//!
//! Sources produce unsigned 16-bit offset-binary codes, mid-scale meaning
//! silence, the same format the converter writes into the sample banks.
//! `spawn_paced` runs a source on its own thread at the sample rate and
//! pushes its output into a capture channel.

use std::f32::consts::TAU;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::dma::CaptureFeeder;
use crate::error::{PipelineError, Result};
use crate::params::capture_constants::MID_SCALE;

/// Converter stand-in producing offset-binary samples
pub trait SampleSource: Send {
    /// Rate the samples are meant to be played at (Hz)
    fn sample_rate_hz(&self) -> u32;

    /// Fill `out` with the next samples
    fn fill(&mut self, out: &mut [u16]);
}

/// Map a normalized sample in [-1, 1] to an offset-binary code
pub fn to_offset_binary(sample: f32) -> u16 {
    let scaled = sample.clamp(-1.0, 1.0) * MID_SCALE as f32;
    (MID_SCALE as f32 + scaled).round().clamp(0.0, u16::MAX as f32) as u16
}

/// Pure sine around mid-scale
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency_hz: f32,
    amplitude: f32,
    sample_rate_hz: u32,
    phase: f32,
}

impl ToneSource {
    /// `amplitude` is a fraction of full scale in [0, 1]
    pub fn new(frequency_hz: f32, amplitude: f32, sample_rate_hz: u32) -> Result<Self> {
        if sample_rate_hz == 0 {
            return Err(PipelineError::InvalidConfig(
                "tone sample rate must be > 0".to_string(),
            ));
        }
        let nyquist = sample_rate_hz as f32 / 2.0;
        if !(0.0..nyquist).contains(&frequency_hz) {
            return Err(PipelineError::InvalidConfig(format!(
                "tone frequency {} Hz outside [0, {})",
                frequency_hz, nyquist
            )));
        }
        if !(0.0..=1.0).contains(&amplitude) {
            return Err(PipelineError::InvalidConfig(format!(
                "tone amplitude {} outside [0, 1]",
                amplitude
            )));
        }
        Ok(Self {
            frequency_hz,
            amplitude,
            sample_rate_hz,
            phase: 0.0,
        })
    }

    /// Constant mid-scale output
    pub fn silence(sample_rate_hz: u32) -> Self {
        Self {
            frequency_hz: 0.0,
            amplitude: 0.0,
            sample_rate_hz: sample_rate_hz.max(1),
            phase: 0.0,
        }
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }
}

impl SampleSource for ToneSource {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn fill(&mut self, out: &mut [u16]) {
        let step = TAU * self.frequency_hz / self.sample_rate_hz as f32;
        for sample in out.iter_mut() {
            *sample = to_offset_binary(self.amplitude * self.phase.sin());
            self.phase = (self.phase + step) % TAU;
        }
    }
}

/// WAV file decoded up front, mixed to mono, played in a loop
#[derive(Debug, Clone)]
pub struct WavSource {
    samples: Vec<u16>,
    position: usize,
    sample_rate_hz: u32,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let full_scale = (1u32 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let mono: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        info!(
            path = %path.display(),
            sample_rate_hz = spec.sample_rate,
            channels,
            frames = mono.len(),
            "wav source loaded"
        );
        Self::from_samples(&mono, spec.sample_rate)
    }

    /// Build from normalized mono samples
    pub fn from_samples(samples: &[f32], sample_rate_hz: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(PipelineError::Source("wav source has no samples".to_string()));
        }
        if sample_rate_hz == 0 {
            return Err(PipelineError::Source("wav sample rate is 0".to_string()));
        }
        Ok(Self {
            samples: samples.iter().map(|&s| to_offset_binary(s)).collect(),
            position: 0,
            sample_rate_hz,
        })
    }

    /// Length of one loop in samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for WavSource {
    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn fill(&mut self, out: &mut [u16]) {
        for sample in out.iter_mut() {
            *sample = self.samples[self.position];
            self.position = (self.position + 1) % self.samples.len();
        }
    }
}

/// Running converter thread; stops when dropped
pub struct PacedSource {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PacedSource {
    /// Signal the thread to stop and wait for it
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PacedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `source` in real time, pushing `chunk` samples at a time into `feeder`
pub fn spawn_paced<S, const N: usize>(
    mut source: S,
    feeder: CaptureFeeder<N>,
    chunk: usize,
) -> PacedSource
where
    S: SampleSource + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let chunk = chunk.max(1);

    let handle = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let rate = source.sample_rate_hz().max(1) as u64;
            let mut buf = vec![MID_SCALE; chunk];
            let mut produced: u64 = 0;
            let start = Instant::now();

            debug!(rate, chunk, "paced source started");
            while !stop.load(Ordering::Relaxed) {
                source.fill(&mut buf);
                feeder.convert(&buf);
                produced += chunk as u64;

                // Sleep against an absolute deadline so rounding never drifts
                let deadline = start + Duration::from_nanos(produced * 1_000_000_000 / rate);
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                }
            }
            debug!(produced, "paced source stopped");
        })
    };

    PacedSource {
        stop,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SampleBanks, Slot};
    use crate::hal::dma::DmaCapture;
    use crate::hal::CaptureChannel;

    #[test]
    fn test_offset_binary_range() {
        assert_eq!(to_offset_binary(0.0), MID_SCALE);
        assert_eq!(to_offset_binary(1.0), u16::MAX);
        assert_eq!(to_offset_binary(-1.0), 0);
        assert_eq!(to_offset_binary(7.0), u16::MAX);
    }

    #[test]
    fn test_silence_is_mid_scale() {
        let mut source = ToneSource::silence(48_000);
        let mut buf = [0u16; 64];
        source.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == MID_SCALE));
    }

    #[test]
    fn test_tone_rejects_above_nyquist() {
        assert!(ToneSource::new(24_000.0, 0.5, 48_000).is_err());
        assert!(ToneSource::new(1_000.0, 1.5, 48_000).is_err());
        assert!(ToneSource::new(1_000.0, 0.5, 48_000).is_ok());
    }

    #[test]
    fn test_tone_swings_around_mid_scale() {
        let mut source = ToneSource::new(1_000.0, 0.5, 48_000).unwrap();
        let mut buf = [0u16; 48];
        source.fill(&mut buf);

        let max = *buf.iter().max().unwrap();
        let min = *buf.iter().min().unwrap();
        assert!(max > MID_SCALE + 16_000);
        assert!(min < MID_SCALE - 16_000);
    }

    #[test]
    fn test_wav_loops() {
        let mut source = WavSource::from_samples(&[0.0, 1.0, -1.0], 8_000).unwrap();
        let mut buf = [0u16; 7];
        source.fill(&mut buf);
        assert_eq!(buf, [MID_SCALE, u16::MAX, 0, MID_SCALE, u16::MAX, 0, MID_SCALE]);
    }

    #[test]
    fn test_wav_file_mixes_to_mono() {
        let path = std::env::temp_dir().join(format!("pulsestrip-mono-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(i16::MAX).unwrap();
            writer.write_sample(i16::MIN + 1).unwrap();
        }
        writer.finalize().unwrap();

        let mut source = WavSource::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(source.sample_rate_hz(), 16_000);
        assert_eq!(source.len(), 4);
        let mut buf = [0u16; 4];
        source.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == MID_SCALE));
    }

    #[test]
    fn test_wav_missing_file() {
        let err = WavSource::open("/nonexistent/pulsestrip.wav").unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    #[test]
    fn test_paced_source_fills_blocks() {
        let mut dma = DmaCapture::<64>::new();
        dma.start_capture(Arc::new(SampleBanks::new()), Slot::A, 48_000);

        let source = ToneSource::new(440.0, 0.5, 48_000).unwrap();
        let mut paced = spawn_paced(source, dma.feeder(), 16);

        let start = Instant::now();
        while dma.transfers_completed() == 0 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
        paced.stop();

        assert_eq!(dma.transfers_completed(), 1);
        assert!(!dma.is_running());
    }
}
