//! Sample acquisition parameters and constants.

use crate::error::{PipelineError, Result};

/// Capture constants (compile-time, match the converter setup)
pub mod capture_constants {
    /// Converter sampling frequency (Hz)
    pub const SAMPLE_RATE_HZ: u32 = 48_000;

    /// Mid-scale code of the unsigned 16-bit converter (zero signal)
    pub const MID_SCALE: u16 = 1 << 15;

    /// Samples handed to the transfer engine per converter tick batch
    pub const FEED_CHUNK: usize = 64;
}

/// Supported sample block lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BlockSize {
    /// 256 samples (5.3 ms @ 48 kHz, 128 spectrum bins)
    #[default]
    #[value(name = "256")]
    N256,

    /// 512 samples (10.7 ms @ 48 kHz, 256 spectrum bins)
    #[value(name = "512")]
    N512,
}

impl BlockSize {
    /// Number of samples per block
    pub fn len(self) -> usize {
        match self {
            BlockSize::N256 => 256,
            BlockSize::N512 => 512,
        }
    }

    /// Number of usable spectrum bins (N/2)
    pub fn half(self) -> usize {
        self.len() / 2
    }

    /// Parse a raw length from a config file
    pub fn from_len(len: usize) -> Result<Self> {
        match len {
            256 => Ok(BlockSize::N256),
            512 => Ok(BlockSize::N512),
            other => Err(PipelineError::InvalidConfig(format!(
                "block size must be 256 or 512, got {}",
                other
            ))),
        }
    }
}

/// Sample capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Samples per block (N)
    pub block_size: BlockSize,

    /// Converter sampling frequency (Hz), fixed for the process lifetime
    pub sample_rate_hz: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            block_size: BlockSize::N256,
            sample_rate_hz: capture_constants::SAMPLE_RATE_HZ,
        }
    }
}

impl CaptureConfig {
    /// Frequency resolution of one spectrum bin (Hz)
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / self.block_size.len() as f32
    }

    /// Convert spectrum bin index to its center frequency (Hz)
    pub fn bin_to_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz()
    }

    /// Duration of one full block (seconds)
    pub fn block_duration_s(&self) -> f32 {
        self.block_size.len() as f32 / self.sample_rate_hz as f32
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(PipelineError::InvalidConfig(
                "sample rate must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
