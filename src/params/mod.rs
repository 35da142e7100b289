//! Parameter definitions with physical units and documented semantics.
//!
//! Magic numbers live here with:
//! - Physical units (Hz, µs, samples)
//! - Documented ranges and meanings
//! - Validation that runs once, before the pipeline starts

mod bands;
mod capture;
mod file;
mod mapping;
mod strip;

pub use bands::{BandTable, BAND_COUNT};
pub use capture::{capture_constants, BlockSize, CaptureConfig};
pub use file::AppConfig;
pub use mapping::MappingConfig;
pub use strip::StripConfig;
