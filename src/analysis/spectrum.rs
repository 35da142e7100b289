//! Windowed magnitude spectrum of one sample block.

use rustfft::num_complex::Complex;
use tracing::trace;

use super::transform::{RustFftTransform, SpectrumTransform};
use super::window::{Window, Q15_ONE};
use crate::error::{PipelineError, Result};

/// Computes magnitude spectra into a single reusable scratch region
pub struct SpectralAnalyzer<T = RustFftTransform> {
    transform: T,
    buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralAnalyzer<RustFftTransform> {
    /// Analyzer for blocks of `len` samples
    pub fn new(len: usize) -> Self {
        Self::with_transform(RustFftTransform::new(len))
    }
}

impl<T: SpectrumTransform> SpectralAnalyzer<T> {
    pub fn with_transform(transform: T) -> Self {
        let len = transform.len();
        Self {
            transform,
            buffer: vec![Complex::new(0.0, 0.0); len],
            magnitudes: vec![0.0; len / 2],
        }
    }

    /// Block length N
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Spectrum length N/2
    pub fn half(&self) -> usize {
        self.magnitudes.len()
    }

    /// Magnitude-squared spectrum of `samples`, first N/2 bins.
    ///
    /// Samples are recentered around mid-scale, weighted by `window` in Q15,
    /// then transformed. Coefficients are normalized by N so a full-scale
    /// signal stays below 1.0. The returned slice is overwritten by the next
    /// call.
    pub fn analyze(&mut self, samples: &[u16], window: &Window) -> Result<&[f32]> {
        let n = self.buffer.len();
        if samples.len() != n {
            return Err(PipelineError::InvalidInput("sample block length mismatch"));
        }
        if window.len() != n {
            return Err(PipelineError::InvalidInput("window length mismatch"));
        }

        for (i, (slot, &sample)) in self.buffer.iter_mut().zip(samples).enumerate() {
            let weighted = window.apply(i, sample);
            *slot = Complex::new(weighted as f32 / Q15_ONE as f32, 0.0);
        }

        self.transform.forward(&mut self.buffer);

        let scale = 1.0 / n as f32;
        for (magnitude, coeff) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *magnitude = (*coeff * scale).norm_sqr();
        }
        trace!(bins = self.magnitudes.len(), "spectrum computed");

        Ok(&self.magnitudes)
    }

    /// Spectrum from the last `analyze` call
    pub fn spectrum(&self) -> &[f32] {
        &self.magnitudes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::source::{SampleSource, ToneSource};
    use crate::params::capture_constants::MID_SCALE;

    const N: usize = 256;

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > values[best] { i } else { best })
    }

    #[test]
    fn test_rejects_wrong_length() {
        let mut analyzer = SpectralAnalyzer::new(N);
        let window = Window::hann(N).unwrap();

        let short = [MID_SCALE; N - 1];
        assert_eq!(
            analyzer.analyze(&short, &window),
            Err(PipelineError::InvalidInput("sample block length mismatch"))
        );

        let samples = [MID_SCALE; N];
        let wrong_window = Window::hann(N / 2).unwrap();
        assert!(analyzer.analyze(&samples, &wrong_window).is_err());
    }

    #[test]
    fn test_silence_is_zero() {
        let mut analyzer = SpectralAnalyzer::new(N);
        let window = Window::hann(N).unwrap();

        let spectrum = analyzer.analyze(&[MID_SCALE; N], &window).unwrap();
        assert_eq!(spectrum.len(), N / 2);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        // Bin 20 at 48 kHz / 256 = 3750 Hz
        let mut source = ToneSource::new(3_750.0, 0.5, 48_000).unwrap();
        let mut samples = [0u16; N];
        source.fill(&mut samples);

        let mut analyzer = SpectralAnalyzer::new(N);
        let window = Window::hann(N).unwrap();
        let spectrum = analyzer.analyze(&samples, &window).unwrap();

        assert_eq!(argmax(spectrum), 20);
        assert!(spectrum[20] > 1e-3);
        assert!(spectrum[60] < spectrum[20] * 1e-3);

        let peak = spectrum[20];
        assert_eq!(analyzer.spectrum()[20], peak);
        assert_eq!(analyzer.spectrum().len(), N / 2);
    }
}
