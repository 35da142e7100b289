//! Color representations and per-channel arithmetic.
//!
//! Packed colors are 24-bit integers with red in bits 16-23, green in bits
//! 8-15 and blue in bits 0-7.

use serde::Deserialize;

use crate::error::{PipelineError, Result};

const RED_SHIFT: u32 = 16;
const GRN_SHIFT: u32 = 8;
const BLU_SHIFT: u32 = 0;

/// Three-channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Pack into a 24-bit integer
    pub const fn pack(self) -> u32 {
        ((self.red as u32) << RED_SHIFT)
            | ((self.green as u32) << GRN_SHIFT)
            | ((self.blue as u32) << BLU_SHIFT)
    }

    /// Unpack from a 24-bit integer (bits above 23 are ignored)
    pub const fn unpack(packed: u32) -> Self {
        Self {
            red: (packed >> RED_SHIFT) as u8,
            green: (packed >> GRN_SHIFT) as u8,
            blue: (packed >> BLU_SHIFT) as u8,
        }
    }

    /// Add `delta` to every channel, saturating to [0, 255]
    pub fn offset(self, delta: i16) -> Self {
        Self {
            red: add_clamp(self.red, delta),
            green: add_clamp(self.green, delta),
            blue: add_clamp(self.blue, delta),
        }
    }

    /// Divide every channel by `divisor` (0 and 1 leave the color unchanged)
    pub fn dim(self, divisor: u8) -> Self {
        if divisor <= 1 {
            return self;
        }
        Self {
            red: self.red / divisor,
            green: self.green / divisor,
            blue: self.blue / divisor,
        }
    }

    /// Color on the hue wheel at `hue` in [0, 1), full saturation and value
    pub fn from_hue(hue: f32) -> Self {
        let h = hue.rem_euclid(1.0) * 6.0;
        let sector = h.floor() as u8;
        let rising = ((h - h.floor()) * 255.0).round() as u8;
        let falling = 255 - rising;
        match sector {
            0 => Rgb::new(255, rising, 0),
            1 => Rgb::new(falling, 255, 0),
            2 => Rgb::new(0, 255, rising),
            3 => Rgb::new(0, falling, 255),
            4 => Rgb::new(rising, 0, 255),
            _ => Rgb::new(255, 0, falling),
        }
    }
}

impl From<u32> for Rgb {
    fn from(packed: u32) -> Self {
        Rgb::unpack(packed)
    }
}

impl From<Rgb> for u32 {
    fn from(color: Rgb) -> Self {
        color.pack()
    }
}

/// Saturating signed add on one channel
pub fn add_clamp(value: u8, delta: i16) -> u8 {
    (value as i32 + delta as i32).clamp(0, 255) as u8
}

/// Ordered packed colors for one strip refresh.
///
/// Allocated once for `P` pixels; writers overwrite in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorFrame {
    pixels: Vec<u32>,
}

impl ColorFrame {
    /// All-off frame of `pixel_count` pixels
    pub fn new(pixel_count: usize) -> Result<Self> {
        if pixel_count == 0 {
            return Err(PipelineError::InvalidInput("pixel count must be positive"));
        }
        Ok(Self {
            pixels: vec![0; pixel_count],
        })
    }

    /// Build a frame from already packed colors
    pub fn from_packed(pixels: &[u32]) -> Result<Self> {
        if pixels.is_empty() {
            return Err(PipelineError::InvalidInput("empty color frame"));
        }
        Ok(Self {
            pixels: pixels.iter().map(|&p| p & 0x00FF_FFFF).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Packed colors in strip order
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn set(&mut self, index: usize, color: Rgb) {
        self.pixels[index] = color.pack();
    }

    pub fn get(&self, index: usize) -> Rgb {
        Rgb::unpack(self.pixels[index])
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color.pack());
    }

    /// True when every pixel is dark
    pub fn is_all_off(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_layout() {
        assert_eq!(Rgb::new(0x12, 0x34, 0x56).pack(), 0x123456);
        assert_eq!(Rgb::unpack(0xFF0080), Rgb::new(0xFF, 0x00, 0x80));
    }

    #[test]
    fn test_dim_divides_channels() {
        assert_eq!(Rgb::new(200, 100, 9).dim(2), Rgb::new(100, 50, 4));
        assert_eq!(Rgb::new(200, 100, 9).dim(0), Rgb::new(200, 100, 9));
    }

    #[test]
    fn test_offset_saturates() {
        assert_eq!(Rgb::new(250, 10, 128).offset(20), Rgb::new(255, 30, 148));
        assert_eq!(Rgb::new(250, 10, 128).offset(-20), Rgb::new(230, 0, 108));
        assert_eq!(Rgb::new(255, 255, 255).offset(-255), Rgb::OFF);
    }

    #[test]
    fn test_hue_wheel_primaries() {
        assert_eq!(Rgb::from_hue(0.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hue(1.0 / 3.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hue(2.0 / 3.0), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert_eq!(
            ColorFrame::new(0),
            Err(PipelineError::InvalidInput("pixel count must be positive"))
        );
        assert!(ColorFrame::from_packed(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_pack_round_trip(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let color = Rgb::new(r, g, b);
            prop_assert_eq!(Rgb::unpack(color.pack()), color);
        }

        #[test]
        fn prop_add_clamp_in_range(value in any::<u8>(), delta in any::<i16>()) {
            let expected = (value as i32 + delta as i32).clamp(0, 255);
            prop_assert_eq!(add_clamp(value, delta) as i32, expected);
        }
    }
}
