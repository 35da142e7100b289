//! Spectral analysis: window, transform, magnitude spectrum, band peaks.

pub mod peaks;
pub mod spectrum;
pub mod transform;
pub mod window;

pub use peaks::{extract_peaks, Peak, PeakSet};
pub use spectrum::SpectralAnalyzer;
pub use transform::{RustFftTransform, SpectrumTransform};
pub use window::Window;
