//! Addressable LED output: colors, protocol symbols and the frame encoder.

pub mod color;
pub mod encoder;
pub mod protocol;

pub use color::{add_clamp, ColorFrame, Rgb};
pub use encoder::LedEncoder;
pub use protocol::{BackendKind, Bitstream, LedBackend, SpiBurst, SymbolShape, TimerPwm};
