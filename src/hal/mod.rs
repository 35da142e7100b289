//! Hardware channel boundary.
//!
//! The pipeline talks to two transfer channels: one fills sample banks from
//! the converter, one clocks LED symbols out. Each reports completion through
//! a `TransferComplete` handler, the host equivalent of a transfer-complete
//! interrupt. `dma` provides software engines for both directions; `source`
//! and `sink` provide the converters and outputs that pace them.

use std::sync::Arc;

use crate::capture::{SampleBanks, Slot};
use crate::led::protocol::Bitstream;

pub mod dma;
pub mod irq;
#[cfg(feature = "mic")]
pub mod mic;
pub mod sink;
pub mod source;

/// Completion notification raised by a channel when a transfer finishes
pub trait TransferComplete: Send + Sync {
    fn on_transfer_complete(&self);
}

/// Converter-fed transfer channel writing into one of two sample banks
pub trait CaptureChannel<const N: usize> {
    /// Register the handler invoked after each completed block
    fn on_capture_complete(&mut self, handler: Arc<dyn TransferComplete>);

    /// Start filling `dest` with N samples at `sample_rate_hz`
    fn start_capture(&mut self, banks: Arc<SampleBanks<N>>, dest: Slot, sample_rate_hz: u32);

    /// Point the next fill at `dest`
    fn retarget_capture(&mut self, dest: Slot);

    /// Re-enable the request line cleared by the last completion
    fn restart_capture(&mut self);

    /// Samples the converter produced while the channel was stopped
    fn samples_dropped(&self) -> u64 {
        0
    }
}

/// Transfer channel clocking a symbol stream out to the strip
pub trait TransmitChannel {
    /// Register the handler invoked after each completed transmission
    fn on_transmit_complete(&mut self, handler: Arc<dyn TransferComplete>);

    /// Start clocking out `source`.
    ///
    /// The channel takes the encoded contents and leaves a spare buffer of
    /// the same capacity in `source` for the next encode.
    fn start_transmit(&mut self, source: &mut Bitstream);
}
