//! Peak-to-color mapping parameters.

use crate::error::{PipelineError, Result};
use crate::led::color::Rgb;
use crate::params::BAND_COUNT;

/// Per-pixel hysteresis and palette settings
#[derive(Debug, Clone)]
pub struct MappingConfig {
    /// Rise in band magnitude that brightens a pixel (magnitude² units).
    /// One value applies to every pixel; otherwise one per pixel.
    pub rise_threshold: Vec<f32>,

    /// Magnitudes below this count as silence and darken the pixel
    pub noise_floor: f32,

    /// Dim level change per cycle (channel counts, 1-255)
    pub dim_step: i16,

    /// Base color per band; empty means evenly spaced hues
    pub palette: Vec<Rgb>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            rise_threshold: vec![1e-5],
            noise_floor: 1e-6,
            dim_step: 64,
            palette: Vec::new(),
        }
    }
}

impl MappingConfig {
    /// Rise threshold for `pixel`
    pub fn threshold_for(&self, pixel: usize) -> f32 {
        match self.rise_threshold.as_slice() {
            [single] => *single,
            per_pixel => per_pixel[pixel],
        }
    }

    /// Base color for `band`
    pub fn base_color(&self, band: usize) -> Rgb {
        if self.palette.is_empty() {
            Rgb::from_hue(band as f32 / BAND_COUNT as f32)
        } else {
            self.palette[band % self.palette.len()]
        }
    }

    pub fn validate(&self, pixel_count: usize) -> Result<()> {
        let count = self.rise_threshold.len();
        if count != 1 && count != pixel_count {
            return Err(PipelineError::InvalidConfig(format!(
                "need 1 or {} rise thresholds, got {}",
                pixel_count, count
            )));
        }
        if self.rise_threshold.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(PipelineError::InvalidConfig(
                "rise thresholds must be finite and >= 0".to_string(),
            ));
        }
        if !self.noise_floor.is_finite() || self.noise_floor < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "noise floor must be finite and >= 0".to_string(),
            ));
        }
        if !(1..=255).contains(&self.dim_step) {
            return Err(PipelineError::InvalidConfig(format!(
                "dim step must be in 1..=255, got {}",
                self.dim_step
            )));
        }
        Ok(())
    }
}
