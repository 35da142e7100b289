//! Frequency transform boundary.
//!
//! The analyzer owns windowing and peak extraction; the transform itself is
//! injected behind `SpectrumTransform`. `RustFftTransform` is the default.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner, Length};

/// Forward transform over a fixed length
pub trait SpectrumTransform {
    /// Number of points
    fn len(&self) -> usize;

    /// Transform `buffer` in place (`buffer.len() == self.len()`)
    fn forward(&mut self, buffer: &mut [Complex<f32>]);
}

/// Planned `rustfft` forward transform with its own scratch space
pub struct RustFftTransform {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFftTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self { fft, scratch }
    }
}

impl SpectrumTransform for RustFftTransform {
    fn len(&self) -> usize {
        self.fft.len()
    }

    fn forward(&mut self, buffer: &mut [Complex<f32>]) {
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }
}
