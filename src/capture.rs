//! Double-buffered sample acquisition.
//!
//! Two fixed sample banks alternate between ACTIVE (owned by the capture
//! channel, being filled) and READY (filled, waiting for software). When a
//! fill completes the channel clears its own request line, so acquisition
//! pauses until `retrieve` hands the READY bank to software and restarts the
//! channel on the other bank. A consumer that stops polling stops capture.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::hal::irq::IrqLine;
use crate::hal::{CaptureChannel, TransferComplete};

/// Identity of one of the two sample banks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The other bank
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// The two statically sized sample banks, allocated once at startup
#[derive(Debug)]
pub struct SampleBanks<const N: usize> {
    banks: [Mutex<[u16; N]>; 2],
}

impl<const N: usize> SampleBanks<N> {
    pub fn new() -> Self {
        Self {
            banks: [Mutex::new([0; N]), Mutex::new([0; N])],
        }
    }

    /// Lock one bank; the transfer engine uses this to write, software to read
    pub fn lock(&self, slot: Slot) -> MutexGuard<'_, [u16; N]> {
        self.banks[slot.index()].lock()
    }
}

impl<const N: usize> Default for SampleBanks<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Role state guarded by the capture interrupt line
#[derive(Debug)]
struct CaptureFlags {
    /// Bank the channel is filling (or has just filled, if `ready`)
    active: Slot,

    /// A filled bank is waiting for software
    ready: bool,

    /// Bank most recently handed to software
    retrieved: Option<Slot>,
}

/// Completion side of the capture channel
#[derive(Debug)]
struct CaptureIrq {
    line: IrqLine<CaptureFlags>,
}

impl TransferComplete for CaptureIrq {
    fn on_transfer_complete(&self) {
        let mut flags = self.line.enter_handler();
        flags.ready = true;
        trace!(slot = ?flags.active, "capture block complete");
    }
}

/// A filled sample block handed to software.
///
/// Valid until the next `retrieve`, after which the channel may refill it.
pub struct SampleBlock<'a, const N: usize> {
    slot: Slot,
    samples: MutexGuard<'a, [u16; N]>,
}

impl<const N: usize> SampleBlock<'_, N> {
    /// Which bank these samples live in
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn samples(&self) -> &[u16; N] {
        &self.samples
    }
}

impl<const N: usize> std::ops::Deref for SampleBlock<'_, N> {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        &self.samples[..]
    }
}

/// Producer/consumer boundary between the capture channel and the main loop
pub struct SampleCapture<C, const N: usize> {
    channel: C,
    banks: Arc<SampleBanks<N>>,
    irq: Arc<CaptureIrq>,
    blocks_retrieved: u64,
}

impl<C: CaptureChannel<N>, const N: usize> SampleCapture<C, N> {
    /// Arm `channel` to fill bank A continuously at `sample_rate_hz`
    pub fn initialize(mut channel: C, sample_rate_hz: u32) -> Self {
        let banks = Arc::new(SampleBanks::new());
        let irq = Arc::new(CaptureIrq {
            line: IrqLine::new(CaptureFlags {
                active: Slot::A,
                ready: false,
                retrieved: None,
            }),
        });

        channel.on_capture_complete(irq.clone());
        channel.start_capture(Arc::clone(&banks), Slot::A, sample_rate_hz);
        debug!(block = N, sample_rate_hz, "sample capture armed on bank A");

        Self {
            channel,
            banks,
            irq,
            blocks_retrieved: 0,
        }
    }

    /// Take the filled block if one is ready; never blocks.
    ///
    /// Returns `None` while the channel is still filling. On success the
    /// channel is retargeted to the other bank and restarted.
    pub fn retrieve(&mut self) -> Option<SampleBlock<'_, N>> {
        let filled = {
            let mut flags = self.irq.line.mask();
            if !flags.ready {
                return None;
            }

            let filled = flags.active;
            let next = filled.other();
            self.channel.retarget_capture(next);
            flags.ready = false;
            flags.active = next;
            flags.retrieved = Some(filled);
            self.channel.restart_capture();
            filled
        };

        self.blocks_retrieved += 1;
        trace!(slot = ?filled, count = self.blocks_retrieved, "sample block retrieved");

        Some(SampleBlock {
            slot: filled,
            samples: self.banks.lock(filled),
        })
    }

    /// The block handed out by the last successful `retrieve`
    pub fn last_retrieved(&mut self) -> Option<SampleBlock<'_, N>> {
        let slot = self.irq.line.mask().retrieved?;
        Some(SampleBlock {
            slot,
            samples: self.banks.lock(slot),
        })
    }

    /// Bank currently owned by the channel
    pub fn active_slot(&self) -> Slot {
        self.irq.line.mask().active
    }

    /// True when a filled block is waiting
    pub fn is_ready(&self) -> bool {
        self.irq.line.mask().ready
    }

    pub fn blocks_retrieved(&self) -> u64 {
        self.blocks_retrieved
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}
