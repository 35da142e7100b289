//! Peak sets to colors with per-pixel hysteresis.
//!
//! Each pixel follows one band (pixel `i` of `P` watches band `i * K / P`)
//! and keeps a dim level in [-255, 0] across cycles. A rise in the band's
//! peak beyond the pixel's threshold brightens it by one step; a fall beyond
//! the threshold, or a peak under the noise floor, darkens it by one step;
//! anything in between holds. The pixel color is its band's base color offset
//! by the dim level, so -255 is off.

use tracing::trace;

use crate::analysis::PeakSet;
use crate::error::Result;
use crate::led::color::ColorFrame;
use crate::params::{MappingConfig, BAND_COUNT};

/// Darkest dim level (fully off)
pub const DIM_OFF: i16 = -255;

/// Hysteresis state and output frame for one strip
#[derive(Debug, Clone)]
pub struct ColorMapper {
    config: MappingConfig,
    dim: Vec<i16>,
    previous: Option<PeakSet>,
    frame: ColorFrame,
}

impl ColorMapper {
    pub fn new(config: MappingConfig, pixel_count: usize) -> Result<Self> {
        config.validate(pixel_count)?;
        Ok(Self {
            config,
            dim: vec![DIM_OFF; pixel_count],
            previous: None,
            frame: ColorFrame::new(pixel_count)?,
        })
    }

    /// Band followed by `pixel`
    pub fn band_for_pixel(&self, pixel: usize) -> usize {
        pixel * BAND_COUNT / self.dim.len()
    }

    /// Update dim levels from `peaks` and return the resulting frame
    pub fn map(&mut self, peaks: &PeakSet) -> &ColorFrame {
        let previous = self.previous.unwrap_or_default();
        let step = self.config.dim_step;

        for pixel in 0..self.dim.len() {
            let band = self.band_for_pixel(pixel);
            let now = peaks.get(band).magnitude;
            let before = previous.get(band).magnitude;
            let threshold = self.config.threshold_for(pixel);

            let delta = if now < self.config.noise_floor || now < before - threshold {
                -step
            } else if now > before + threshold {
                step
            } else {
                0
            };

            let level = (self.dim[pixel] + delta).clamp(DIM_OFF, 0);
            self.dim[pixel] = level;
            self.frame
                .set(pixel, self.config.base_color(band).offset(level));
        }

        trace!(dim = ?self.dim, "colors mapped");
        self.previous = Some(*peaks);
        &self.frame
    }

    /// Current dim level per pixel
    pub fn dim_levels(&self) -> &[i16] {
        &self.dim
    }

    /// Frame from the last `map` call (all off before the first)
    pub fn frame(&self) -> &ColorFrame {
        &self.frame
    }

    pub fn previous(&self) -> Option<&PeakSet> {
        self.previous.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Peak;
    use crate::led::Rgb;

    fn peaks_with(band: usize, magnitude: f32) -> PeakSet {
        let mut peaks = [Peak::default(); BAND_COUNT];
        peaks[band] = Peak {
            index: band * 16,
            magnitude,
        };
        PeakSet::new(peaks)
    }

    fn config() -> MappingConfig {
        MappingConfig {
            rise_threshold: vec![0.1],
            noise_floor: 0.01,
            dim_step: 100,
            palette: vec![Rgb::new(255, 255, 255)],
        }
    }

    #[test]
    fn test_pixel_band_assignment() {
        let mapper = ColorMapper::new(config(), 16).unwrap();
        assert_eq!(mapper.band_for_pixel(0), 0);
        assert_eq!(mapper.band_for_pixel(1), 0);
        assert_eq!(mapper.band_for_pixel(15), 7);

        let narrow = ColorMapper::new(config(), 3).unwrap();
        assert_eq!(narrow.band_for_pixel(1), 2);
        assert_eq!(narrow.band_for_pixel(2), 5);
    }

    #[test]
    fn test_silence_stays_off() {
        let mut mapper = ColorMapper::new(config(), 8).unwrap();
        for _ in 0..4 {
            assert!(mapper.map(&PeakSet::default()).is_all_off());
        }
    }

    #[test]
    fn test_rise_brightens_then_holds() {
        let mut mapper = ColorMapper::new(config(), 8).unwrap();

        mapper.map(&peaks_with(2, 1.0));
        assert_eq!(mapper.dim_levels()[2], -155);
        assert_eq!(mapper.frame().get(2), Rgb::new(100, 100, 100));
        assert_eq!(mapper.dim_levels()[3], DIM_OFF);

        // Steady above the floor: hold
        mapper.map(&peaks_with(2, 1.05));
        assert_eq!(mapper.dim_levels()[2], -155);

        // Rises saturate at full brightness
        mapper.map(&peaks_with(2, 2.0));
        mapper.map(&peaks_with(2, 3.0));
        assert_eq!(mapper.dim_levels()[2], 0);
        assert_eq!(mapper.frame().get(2), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_fall_and_floor_darken() {
        let mut mapper = ColorMapper::new(config(), 8).unwrap();
        mapper.map(&peaks_with(0, 1.0));
        mapper.map(&peaks_with(0, 2.0));
        assert_eq!(mapper.dim_levels()[0], -55);

        mapper.map(&peaks_with(0, 1.0));
        assert_eq!(mapper.dim_levels()[0], -155);

        mapper.map(&peaks_with(0, 1.0));
        mapper.map(&peaks_with(0, 0.001));
        mapper.map(&peaks_with(0, 0.001));
        assert_eq!(mapper.dim_levels()[0], DIM_OFF);
        assert!(mapper.frame().is_all_off());
    }

    #[test]
    fn test_retains_previous_peaks() {
        let mut mapper = ColorMapper::new(config(), 8).unwrap();
        assert!(mapper.previous().is_none());
        let peaks = peaks_with(4, 0.5);
        mapper.map(&peaks);
        assert_eq!(mapper.previous(), Some(&peaks));
    }
}
