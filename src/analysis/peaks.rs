//! Per-band peak extraction.

use crate::error::Result;
use crate::params::{BandTable, BAND_COUNT};

/// Largest magnitude found in one band
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Peak {
    /// Spectrum bin of the maximum
    pub index: usize,
    pub magnitude: f32,
}

/// One peak per configured band, in band order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeakSet {
    peaks: [Peak; BAND_COUNT],
}

impl PeakSet {
    pub fn new(peaks: [Peak; BAND_COUNT]) -> Self {
        Self { peaks }
    }

    pub fn peaks(&self) -> &[Peak; BAND_COUNT] {
        &self.peaks
    }

    pub fn get(&self, band: usize) -> Peak {
        self.peaks[band]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.iter()
    }

    /// Band holding the overall maximum (last one wins on ties)
    pub fn loudest_band(&self) -> usize {
        let mut best = 0;
        for (b, peak) in self.peaks.iter().enumerate() {
            if self.peaks[best].magnitude <= peak.magnitude {
                best = b;
            }
        }
        best
    }
}

/// Scan each band of `spectrum` for its maximum.
///
/// Among equal maxima the highest index wins. Fails with `InvalidConfig` if
/// the table reaches past the end of the spectrum.
pub fn extract_peaks(spectrum: &[f32], bands: &BandTable) -> Result<PeakSet> {
    bands.check_fits(spectrum.len())?;

    let mut peaks = [Peak::default(); BAND_COUNT];
    for (peak, range) in peaks.iter_mut().zip(bands.ranges()) {
        let mut best = Peak {
            index: range.start,
            magnitude: spectrum[range.start],
        };
        for index in range {
            let magnitude = spectrum[index];
            if best.magnitude <= magnitude {
                best = Peak { index, magnitude };
            }
        }
        *peak = best;
    }
    Ok(PeakSet { peaks })
}
