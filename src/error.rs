//! Error types shared by the capture, analysis and LED stages.

use thiserror::Error;

/// Errors returned by the pipeline stages.
///
/// "No samples yet" is not an error: `SampleCapture::retrieve` returns `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Null, empty or size-mismatched argument
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Malformed static configuration (band table, pixel count, thresholds)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sample source could not be opened or started
    #[error("sample source: {0}")]
    Source(String),
}

impl From<hound::Error> for PipelineError {
    fn from(e: hound::Error) -> Self {
        PipelineError::Source(e.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PipelineError>;
