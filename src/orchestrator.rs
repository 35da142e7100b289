//! The single control loop tying capture, analysis, mapping and output.
//!
//! Five stages run in a fixed cycle:
//!
//! ```text
//! AwaitSamples -> Analyze -> MapColors -> AwaitLedReady -> Transmit -> AwaitSamples
//! ```
//!
//! The two await stages poll without blocking; `step` returns the same stage
//! until the condition holds. Every buffer the loop touches is allocated in
//! `new`.

use std::thread;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::analysis::{extract_peaks, PeakSet, SpectralAnalyzer, Window};
use crate::capture::SampleCapture;
use crate::error::{PipelineError, Result};
use crate::hal::{CaptureChannel, TransmitChannel};
use crate::led::LedEncoder;
use crate::mapping::ColorMapper;
use crate::params::{AppConfig, BandTable};

/// Position in the control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitSamples,
    Analyze,
    MapColors,
    AwaitLedReady,
    Transmit,
}

/// Loop behavior switches
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Log every spectrum bin each cycle
    pub dump_spectrum: bool,

    /// Cycles between throughput reports (0 disables)
    pub stats_interval: u64,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            dump_spectrum: false,
            stats_interval: 500,
        }
    }
}

/// Throughput counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleStats {
    /// Completed AwaitSamples..Transmit cycles
    pub cycles: u64,

    /// Frames handed to the LED channel
    pub frames_sent: u64,

    /// Converter samples lost while capture was stalled
    pub samples_dropped: u64,

    /// Cycles per second since the loop was built
    pub cycle_rate_hz: f32,
}

pub struct Orchestrator<C, X, const N: usize> {
    capture: SampleCapture<C, N>,
    analyzer: SpectralAnalyzer,
    window: Window,
    bands: BandTable,
    peaks: PeakSet,
    mapper: ColorMapper,
    encoder: LedEncoder<X>,
    stage: Stage,
    options: LoopOptions,
    cycles: u64,
    started: Instant,
}

impl<C, X, const N: usize> Orchestrator<C, X, N>
where
    C: CaptureChannel<N>,
    X: TransmitChannel,
{
    /// Assemble the loop; fails fast on any configuration problem
    pub fn new(
        capture: SampleCapture<C, N>,
        encoder: LedEncoder<X>,
        config: &AppConfig,
        options: LoopOptions,
    ) -> Result<Self> {
        config.validate()?;
        if config.capture.block_size.len() != N {
            return Err(PipelineError::InvalidConfig(format!(
                "configured block size {} does not match capture block {}",
                config.capture.block_size.len(),
                N
            )));
        }
        if encoder.pixel_count() != config.strip.pixel_count {
            return Err(PipelineError::InvalidConfig(format!(
                "encoder drives {} pixels, strip has {}",
                encoder.pixel_count(),
                config.strip.pixel_count
            )));
        }

        let bands = config.band_table()?;
        let mapper = ColorMapper::new(config.mapping.clone(), config.strip.pixel_count)?;
        info!(
            block = N,
            sample_rate_hz = config.capture.sample_rate_hz,
            bin_width_hz = config.capture.bin_width_hz(),
            pixels = config.strip.pixel_count,
            backend = ?config.strip.backend,
            bands = ?bands.bounds(),
            "pipeline configured"
        );

        Ok(Self {
            capture,
            analyzer: SpectralAnalyzer::new(N),
            window: Window::hann(N)?,
            bands,
            peaks: PeakSet::default(),
            mapper,
            encoder,
            stage: Stage::AwaitSamples,
            options,
            cycles: 0,
            started: Instant::now(),
        })
    }

    /// Run the current stage once and move to the next if it finished
    pub fn step(&mut self) -> Result<Stage> {
        self.stage = match self.stage {
            Stage::AwaitSamples => {
                if self.capture.retrieve().is_some() {
                    Stage::Analyze
                } else {
                    Stage::AwaitSamples
                }
            }
            Stage::Analyze => {
                self.analyze()?;
                Stage::MapColors
            }
            Stage::MapColors => {
                self.mapper.map(&self.peaks);
                Stage::AwaitLedReady
            }
            Stage::AwaitLedReady => {
                if self.encoder.is_ready() {
                    Stage::Transmit
                } else {
                    Stage::AwaitLedReady
                }
            }
            Stage::Transmit => {
                self.encoder.send(self.mapper.frame())?;
                self.cycles += 1;
                trace!(cycle = self.cycles, "cycle complete");
                self.report();
                Stage::AwaitSamples
            }
        };
        Ok(self.stage)
    }

    /// Step until one full cycle has transmitted a frame
    pub fn run_cycle(&mut self) -> Result<()> {
        let target = self.cycles + 1;
        while self.cycles < target {
            let before = self.stage;
            let after = self.step()?;
            if before == after {
                // Polling stage: let the producer threads run
                thread::yield_now();
            }
        }
        Ok(())
    }

    /// Run `max_cycles` cycles, or forever when `None`
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<CycleStats> {
        info!(max_cycles = ?max_cycles, "pipeline running");
        loop {
            if let Some(limit) = max_cycles {
                if self.cycles >= limit {
                    break;
                }
            }
            self.run_cycle()?;
        }
        let stats = self.stats();
        info!(
            cycles = stats.cycles,
            frames = stats.frames_sent,
            dropped = stats.samples_dropped,
            rate_hz = stats.cycle_rate_hz,
            "pipeline stopped"
        );
        Ok(stats)
    }

    fn analyze(&mut self) -> Result<()> {
        let block = self
            .capture
            .last_retrieved()
            .ok_or(PipelineError::InvalidInput("no sample block retrieved"))?;
        let spectrum = self.analyzer.analyze(&block, &self.window)?;

        if self.options.dump_spectrum {
            for (bin, magnitude) in spectrum.iter().enumerate() {
                info!(cycle = self.cycles, bin, magnitude, "spectrum");
            }
        }

        self.peaks = extract_peaks(spectrum, &self.bands)?;
        trace!(slot = ?block.slot(), loudest = self.peaks.loudest_band(), "peaks extracted");
        Ok(())
    }

    fn report(&self) {
        let interval = self.options.stats_interval;
        if interval == 0 || self.cycles % interval != 0 {
            return;
        }
        let stats = self.stats();
        debug!(
            cycles = stats.cycles,
            frames = stats.frames_sent,
            dropped = stats.samples_dropped,
            rate_hz = stats.cycle_rate_hz,
            "pipeline throughput"
        );
    }

    pub fn stats(&self) -> CycleStats {
        let elapsed = self.started.elapsed().as_secs_f32();
        CycleStats {
            cycles: self.cycles,
            frames_sent: self.encoder.frames_started(),
            samples_dropped: self.capture.channel().samples_dropped(),
            cycle_rate_hz: if elapsed > 0.0 {
                self.cycles as f32 / elapsed
            } else {
                0.0
            },
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Peaks from the last Analyze stage
    pub fn peaks(&self) -> &PeakSet {
        &self.peaks
    }

    pub fn mapper(&self) -> &ColorMapper {
        &self.mapper
    }

    pub fn encoder(&self) -> &LedEncoder<X> {
        &self.encoder
    }

    pub fn capture(&self) -> &SampleCapture<C, N> {
        &self.capture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::dma::{CaptureFeeder, DmaCapture, DmaTransmit};
    use crate::hal::sink::RecordingSink;
    use crate::params::capture_constants::MID_SCALE;

    fn build(
        config: &AppConfig,
    ) -> (Orchestrator<DmaCapture<256>, DmaTransmit, 256>, CaptureFeeder<256>, RecordingSink) {
        let dma = DmaCapture::<256>::new();
        let feeder = dma.feeder();
        let capture = SampleCapture::initialize(dma, config.capture.sample_rate_hz);

        let sink = RecordingSink::default();
        let backend = config.strip.led_backend();
        let tx = DmaTransmit::spawn(sink.clone(), 0, config.strip.pixel_count);
        let encoder = LedEncoder::new(backend, config.strip.pixel_count, tx).unwrap();

        let orchestrator =
            Orchestrator::new(capture, encoder, config, LoopOptions::default()).unwrap();
        (orchestrator, feeder, sink)
    }

    #[test]
    fn test_stages_advance_in_order() {
        let config = AppConfig::default();
        let (mut orchestrator, feeder, _sink) = build(&config);

        assert_eq!(orchestrator.stage(), Stage::AwaitSamples);
        assert_eq!(orchestrator.step().unwrap(), Stage::AwaitSamples);
        feeder.convert(&[MID_SCALE; 256]);

        assert_eq!(orchestrator.step().unwrap(), Stage::Analyze);
        assert_eq!(orchestrator.stage(), Stage::Analyze);
        assert_eq!(orchestrator.step().unwrap(), Stage::MapColors);
        assert!(orchestrator.peaks().iter().all(|p| p.magnitude == 0.0));
        assert_eq!(orchestrator.step().unwrap(), Stage::AwaitLedReady);
        assert_eq!(orchestrator.step().unwrap(), Stage::Transmit);
        assert_eq!(orchestrator.step().unwrap(), Stage::AwaitSamples);
        assert_eq!(orchestrator.stats().cycles, 1);
    }

    #[test]
    fn test_rejects_block_size_mismatch() {
        let mut config = AppConfig::default();
        config.capture.block_size = crate::params::BlockSize::N512;

        let dma = DmaCapture::<256>::new();
        let capture = SampleCapture::initialize(dma, 48_000);
        let tx = DmaTransmit::spawn(RecordingSink::default(), 0, 8);
        let encoder = LedEncoder::new(config.strip.led_backend(), 8, tx).unwrap();

        let result = Orchestrator::new(capture, encoder, &config, LoopOptions::default());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_silence_transmits_dark_frame() {
        let config = AppConfig::default();
        let (mut orchestrator, feeder, sink) = build(&config);

        feeder.convert(&[MID_SCALE; 256]);
        orchestrator.run_cycle().unwrap();

        assert!(orchestrator.mapper().frame().is_all_off());
        while sink.frame_count() == 0 {
            thread::yield_now();
        }
        let stream = sink.last().unwrap();
        assert_eq!(stream.symbols().len(), 24 * config.strip.pixel_count);
    }
}
