//! LED strip parameters.

use crate::error::{PipelineError, Result};
use crate::led::protocol::{BackendKind, LedBackend, LATCH_US};

/// LED strip configuration
#[derive(Debug, Clone)]
pub struct StripConfig {
    /// Number of pixels on the strip (P)
    pub pixel_count: usize,

    /// Symbol backend driving the data line
    pub backend: BackendKind,

    /// Idle time after the last pixel that latches the frame (µs)
    pub latch_us: u32,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            pixel_count: 8,
            backend: BackendKind::Spi,
            latch_us: LATCH_US,
        }
    }
}

impl StripConfig {
    /// Timing-resolved backend for this strip
    pub fn led_backend(&self) -> LedBackend {
        LedBackend::from_kind(self.backend, self.latch_us)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pixel_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "pixel count must be > 0".to_string(),
            ));
        }
        if self.latch_us < LATCH_US {
            return Err(PipelineError::InvalidConfig(format!(
                "latch time {} µs is below the {} µs the strip needs",
                self.latch_us, LATCH_US
            )));
        }
        Ok(())
    }
}
