//! Fixed-point analysis window.

use std::f64::consts::PI;

use crate::error::{PipelineError, Result};

/// Q15 fixed-point scale (1.0)
pub const Q15_ONE: i32 = 1 << 15;

/// Symmetric analysis window of Q15 weights, zero at both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    weights: Vec<i16>,
}

impl Window {
    /// Hann window of `len` weights.
    ///
    /// Weights are truncated to Q15 and capped at 32767; the second half
    /// mirrors the first so symmetry is exact.
    pub fn hann(len: usize) -> Result<Self> {
        if len < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "window needs at least 2 weights, got {}",
                len
            )));
        }

        let mut weights = vec![0i16; len];
        let denom = (len - 1) as f64;
        for i in 0..len.div_ceil(2) {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos());
            let q15 = (w * Q15_ONE as f64) as i32;
            weights[i] = q15.clamp(0, i16::MAX as i32) as i16;
            weights[len - 1 - i] = weights[i];
        }
        // Rounding in cos() can leave the ends a hair above zero
        weights[0] = 0;
        weights[len - 1] = 0;

        Ok(Self { weights })
    }

    /// Window from externally supplied weights
    pub fn from_weights(weights: Vec<i16>) -> Result<Self> {
        if weights.len() < 2 {
            return Err(PipelineError::InvalidConfig(
                "window needs at least 2 weights".to_string(),
            ));
        }
        if weights[0] != 0 {
            return Err(PipelineError::InvalidConfig(
                "window must start at zero".to_string(),
            ));
        }
        let n = weights.len();
        if let Some(i) = (0..n / 2).find(|&i| weights[i] != weights[n - 1 - i]) {
            return Err(PipelineError::InvalidConfig(format!(
                "window not symmetric at index {}",
                i
            )));
        }
        if weights.iter().any(|&w| w < 0) {
            return Err(PipelineError::InvalidConfig(
                "window weights must be non-negative".to_string(),
            ));
        }
        Ok(Self { weights })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[i16] {
        &self.weights
    }

    /// Weight at `index`
    pub fn get(&self, index: usize) -> i16 {
        self.weights[index]
    }

    /// Recenter an offset-binary sample and scale by the weight at `index`
    pub fn apply(&self, index: usize, sample: u16) -> i32 {
        let centered = sample as i32 - Q15_ONE;
        (centered * self.weights[index] as i32) >> 15
    }
}
