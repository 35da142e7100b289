//! Pulsestrip library - audio spectrum to addressable LED strip pipeline

pub mod analysis;
pub mod capture;
pub mod cli;
pub mod error;
pub mod hal;
pub mod led;
pub mod mapping;
pub mod orchestrator;
pub mod params;

pub use error::{PipelineError, Result};
