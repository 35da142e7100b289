//! Band-boundary table used by peak extraction.

use std::ops::Range;

use crate::error::{PipelineError, Result};

/// Number of reported bands (K)
pub const BAND_COUNT: usize = 8;

/// K+1 strictly ascending spectrum indices delimiting K adjacent bands.
///
/// Band `b` covers `[bounds[b], bounds[b + 1])`. The final boundary is an
/// exclusive end and may equal N/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandTable {
    bounds: [usize; BAND_COUNT + 1],
}

impl BandTable {
    /// Build a table from raw boundaries, checking count and ordering
    pub fn new(bounds: &[usize]) -> Result<Self> {
        if bounds.len() != BAND_COUNT + 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "band table needs {} boundaries, got {}",
                BAND_COUNT + 1,
                bounds.len()
            )));
        }
        if let Some(pair) = bounds.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(PipelineError::InvalidConfig(format!(
                "band boundaries must be strictly ascending ({} >= {})",
                pair[0], pair[1]
            )));
        }

        let mut table = [0; BAND_COUNT + 1];
        table.copy_from_slice(bounds);
        Ok(Self { bounds: table })
    }

    /// Eight equal-width bands covering `[0, half)`
    pub fn uniform(half: usize) -> Result<Self> {
        let stride = half / BAND_COUNT;
        let mut bounds = [0; BAND_COUNT + 1];
        for (b, bound) in bounds.iter_mut().enumerate() {
            *bound = b * stride;
        }
        Self::new(&bounds)
    }

    /// Raw boundaries
    pub fn bounds(&self) -> &[usize; BAND_COUNT + 1] {
        &self.bounds
    }

    /// Index range covered by band `b`
    pub fn band(&self, b: usize) -> Range<usize> {
        self.bounds[b]..self.bounds[b + 1]
    }

    /// Iterate over all band ranges in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.bounds.windows(2).map(|pair| pair[0]..pair[1])
    }

    /// Band containing spectrum index `bin`, if any
    pub fn band_of(&self, bin: usize) -> Option<usize> {
        self.ranges().position(|range| range.contains(&bin))
    }

    /// Check that every band fits inside a spectrum of `half` bins
    pub fn check_fits(&self, half: usize) -> Result<()> {
        let end = self.bounds[BAND_COUNT];
        if end > half {
            return Err(PipelineError::InvalidConfig(format!(
                "band table ends at {} but the spectrum has {} bins",
                end, half
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_table_matches_stride() {
        let table = BandTable::uniform(128).unwrap();

        assert_eq!(table.bounds(), &[0, 16, 32, 48, 64, 80, 96, 112, 128]);
        assert_eq!(table.band(3), 48..64);
        assert!(table.check_fits(128).is_ok());
    }

    #[test]
    fn test_wrong_count_rejected() {
        let err = BandTable::new(&[0, 8, 16]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_ascending_rejected() {
        assert!(BandTable::new(&[0, 4, 8, 8, 16, 20, 24, 28, 32]).is_err());
        assert!(BandTable::new(&[0, 4, 8, 6, 16, 20, 24, 28, 32]).is_err());
    }

    #[test]
    fn test_table_must_fit_spectrum() {
        let table = BandTable::uniform(256).unwrap();
        assert!(table.check_fits(128).is_err());
    }

    #[test]
    fn test_band_of() {
        let table = BandTable::uniform(128).unwrap();

        assert_eq!(table.band_of(0), Some(0));
        assert_eq!(table.band_of(20), Some(1));
        assert_eq!(table.band_of(127), Some(7));
        assert_eq!(table.band_of(128), None);
    }
}
