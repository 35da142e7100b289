//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::led::BackendKind;
use crate::params::{AppConfig, BlockSize};

/// Where samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Synthetic sine
    Tone,
    /// Looping WAV file (needs --wav)
    Wav,
    /// Default input device (built with the `mic` feature)
    Mic,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pulsestrip")]
#[command(about = "Audio-reactive LED strip driver", long_about = None)]
pub struct Args {
    /// TOML configuration file (flags below override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sample source
    #[arg(long, value_enum, default_value = "tone")]
    pub source: SourceKind,

    /// Tone frequency for --source tone (Hz)
    #[arg(long, value_name = "HZ", default_value = "1000")]
    pub tone_hz: f32,

    /// Tone amplitude as a fraction of full scale
    #[arg(long, value_name = "FRACTION", default_value = "0.5")]
    pub tone_level: f32,

    /// WAV file for --source wav
    #[arg(long, value_name = "FILE")]
    pub wav: Option<PathBuf>,

    /// LED symbol backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Pixels on the strip
    #[arg(long, value_name = "COUNT")]
    pub pixels: Option<usize>,

    /// Samples per analysis block
    #[arg(long, value_enum)]
    pub block_size: Option<BlockSize>,

    /// Stop after this many frames (runs forever otherwise)
    #[arg(long, value_name = "COUNT")]
    pub frames: Option<u64>,

    /// Draw the strip in the terminal
    #[arg(long)]
    pub preview: bool,

    /// Log every spectrum bin each cycle
    #[arg(long)]
    pub dump_spectrum: bool,
}

impl Args {
    /// Apply flag overrides on top of file/default configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(backend) = self.backend {
            config.strip.backend = backend;
        }
        if let Some(pixels) = self.pixels {
            config.strip.pixel_count = pixels;
        }
        if let Some(block_size) = self.block_size {
            config.capture.block_size = block_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "pulsestrip",
            "--backend",
            "pwm",
            "--pixels",
            "30",
            "--block-size",
            "512",
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.strip.backend, BackendKind::Pwm);
        assert_eq!(config.strip.pixel_count, 30);
        assert_eq!(config.capture.block_size, BlockSize::N512);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::parse_from(["pulsestrip"]);
        assert_eq!(args.source, SourceKind::Tone);

        let mut config = AppConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.strip.pixel_count, 8);
    }
}
