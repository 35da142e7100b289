//! Whole-application configuration and its optional TOML file.
//!
//! Defaults come first, then the file, then command-line flags (applied by
//! the binary). Every file field is optional.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::bands::BandTable;
use super::capture::{BlockSize, CaptureConfig};
use super::mapping::MappingConfig;
use super::strip::StripConfig;
use crate::error::{PipelineError, Result};
use crate::led::color::Rgb;
use crate::led::protocol::BackendKind;

/// Everything the pipeline needs before the loop starts
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub capture: CaptureConfig,

    /// Explicit band boundaries; `None` means eight equal bands over N/2
    pub band_bounds: Option<Vec<usize>>,

    pub strip: StripConfig,
    pub mapping: MappingConfig,
}

impl AppConfig {
    /// Defaults overlaid with the TOML file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("read {}: {}", path.display(), e))
        })?;
        let mut config = Self::default();
        config.apply_toml(&text)?;
        debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Overlay values from TOML text
    pub fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)
            .map_err(|e| PipelineError::InvalidConfig(format!("parse config: {}", e)))?;
        self.apply_file(file)
    }

    fn apply_file(&mut self, fc: FileConfig) -> Result<()> {
        if let Some(capture) = fc.capture {
            if let Some(v) = capture.block_size {
                self.capture.block_size = BlockSize::from_len(v)?;
            }
            if let Some(v) = capture.sample_rate_hz {
                self.capture.sample_rate_hz = v;
            }
        }
        if let Some(bands) = fc.bands {
            if let Some(v) = bands.bounds {
                self.band_bounds = Some(v);
            }
        }
        if let Some(strip) = fc.strip {
            if let Some(v) = strip.pixel_count {
                self.strip.pixel_count = v;
            }
            if let Some(v) = strip.backend {
                self.strip.backend = v;
            }
            if let Some(v) = strip.latch_us {
                self.strip.latch_us = v;
            }
        }
        if let Some(mapping) = fc.mapping {
            if let Some(v) = mapping.rise_threshold {
                self.mapping.rise_threshold = v;
            }
            if let Some(v) = mapping.noise_floor {
                self.mapping.noise_floor = v;
            }
            if let Some(v) = mapping.dim_step {
                self.mapping.dim_step = v;
            }
            if let Some(v) = mapping.palette {
                self.mapping.palette = v;
            }
        }
        Ok(())
    }

    /// Band table for the configured block size
    pub fn band_table(&self) -> Result<BandTable> {
        let half = self.capture.block_size.half();
        let table = match &self.band_bounds {
            Some(bounds) => BandTable::new(bounds)?,
            None => BandTable::uniform(half)?,
        };
        table.check_fits(half)?;
        Ok(table)
    }

    /// Check every section; called once before the loop starts
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.band_table()?;
        self.strip.validate()?;
        self.mapping.validate(self.strip.pixel_count)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    capture: Option<CaptureSection>,
    bands: Option<BandsSection>,
    strip: Option<StripSection>,
    mapping: Option<MappingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureSection {
    block_size: Option<usize>,
    sample_rate_hz: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BandsSection {
    bounds: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StripSection {
    pixel_count: Option<usize>,
    backend: Option<BackendKind>,
    latch_us: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingSection {
    rise_threshold: Option<Vec<f32>>,
    noise_floor: Option<f32>,
    dim_step: Option<i16>,
    palette: Option<Vec<Rgb>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.band_table().unwrap(), BandTable::uniform(128).unwrap());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut config = AppConfig::default();
        config
            .apply_toml(
                r#"
                [capture]
                block_size = 512

                [strip]
                pixel_count = 3
                backend = "pwm"

                [mapping]
                rise_threshold = [0.1, 0.2, 0.3]
                palette = [{ red = 255, green = 0, blue = 0 }]
                "#,
            )
            .unwrap();

        assert_eq!(config.capture.block_size, BlockSize::N512);
        assert_eq!(config.capture.sample_rate_hz, 48_000);
        assert_eq!(config.strip.pixel_count, 3);
        assert_eq!(config.strip.backend, BackendKind::Pwm);
        assert_eq!(config.mapping.palette, vec![Rgb::new(255, 0, 0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_band_table_fails_validation() {
        let mut config = AppConfig::default();
        config
            .apply_toml("[bands]\nbounds = [0, 16, 32, 48, 64, 80, 96, 112, 200]")
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        config.band_bounds = Some(vec![0, 16, 32]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_toml("[strip]\npixels = 4").is_err());
        assert!(config.apply_toml("[capture]\nblock_size = 100").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(AppConfig::load("/nonexistent/pulsestrip.toml").is_err());
    }
}
