//! Pulsestrip - drives an addressable LED strip from live audio
//!
//! Samples arrive in double-buffered blocks, each block becomes a windowed
//! spectrum, eight band peaks become pixel colors, and the colors go out as
//! protocol symbols one frame at a time.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pulsestrip::capture::SampleCapture;
use pulsestrip::cli::{Args, SourceKind};
use pulsestrip::hal::dma::{CaptureFeeder, DmaCapture, DmaTransmit};
use pulsestrip::hal::sink::{NullSink, TerminalPreview};
use pulsestrip::hal::source::{spawn_paced, PacedSource, SampleSource, ToneSource, WavSource};
use pulsestrip::led::{LedEncoder, SymbolShape};
use pulsestrip::orchestrator::{LoopOptions, Orchestrator};
use pulsestrip::params::{capture_constants::FEED_CHUNK, AppConfig, BlockSize};

/// Keeps the running converter alive for the life of the loop
#[derive(Default)]
struct ActiveSource {
    _paced: Option<PacedSource>,
    #[cfg(feature = "mic")]
    _mic: Option<pulsestrip::hal::mic::MicSource>,
}

impl ActiveSource {
    fn paced(source: PacedSource) -> Self {
        Self {
            _paced: Some(source),
            ..Self::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsestrip=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    match config.capture.block_size {
        BlockSize::N256 => run::<256>(&args, &config),
        BlockSize::N512 => run::<512>(&args, &config),
    }
}

fn run<const N: usize>(args: &Args, config: &AppConfig) -> Result<()> {
    info!(
        block = N,
        block_ms = config.capture.block_duration_s() * 1000.0,
        bin_hz = config.capture.bin_width_hz(),
        "capture configured"
    );
    let dma = DmaCapture::<N>::new();
    let feeder = dma.feeder();
    let capture = SampleCapture::initialize(dma, config.capture.sample_rate_hz);
    let source = start_source(args, config, feeder)?;

    let pixels = config.strip.pixel_count;
    let backend = config.strip.led_backend();
    let period_ns = backend.symbol_period_ns();
    let tx = if args.preview {
        DmaTransmit::spawn(TerminalPreview::stdout(backend, pixels), period_ns, pixels)
    } else {
        DmaTransmit::spawn(NullSink, period_ns, pixels)
    };
    let encoder = LedEncoder::new(backend, pixels, tx)?;

    let options = LoopOptions {
        dump_spectrum: args.dump_spectrum,
        ..LoopOptions::default()
    };
    let mut orchestrator = Orchestrator::new(capture, encoder, config, options)?;
    let stats = orchestrator.run(args.frames)?;

    drop(source);
    if args.preview {
        println!();
    }
    info!(
        cycles = stats.cycles,
        dropped = stats.samples_dropped,
        rate_hz = stats.cycle_rate_hz,
        "done"
    );
    Ok(())
}

fn start_source<const N: usize>(
    args: &Args,
    config: &AppConfig,
    feeder: CaptureFeeder<N>,
) -> Result<ActiveSource> {
    let rate = config.capture.sample_rate_hz;
    match args.source {
        SourceKind::Tone => {
            let tone = ToneSource::new(args.tone_hz, args.tone_level, rate)
                .context("invalid tone settings")?;
            info!(frequency_hz = tone.frequency_hz(), "tone source");
            Ok(ActiveSource::paced(spawn_paced(tone, feeder, FEED_CHUNK)))
        }
        SourceKind::Wav => {
            let Some(path) = &args.wav else {
                bail!("--source wav needs --wav <FILE>");
            };
            let wav = WavSource::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            if wav.sample_rate_hz() != rate {
                warn!(
                    file_hz = wav.sample_rate_hz(),
                    analysis_hz = rate,
                    "wav rate differs from the configured sample rate"
                );
            }
            Ok(ActiveSource::paced(spawn_paced(wav, feeder, FEED_CHUNK)))
        }
        #[cfg(feature = "mic")]
        SourceKind::Mic => {
            let mic = pulsestrip::hal::mic::MicSource::start(feeder, rate)
                .context("starting microphone")?;
            info!(device = mic.label(), rate_hz = mic.sample_rate_hz(), "microphone source");
            Ok(ActiveSource {
                _mic: Some(mic),
                ..ActiveSource::default()
            })
        }
        #[cfg(not(feature = "mic"))]
        SourceKind::Mic => {
            drop(feeder);
            bail!("microphone input needs a build with `--features mic`")
        }
    }
}
