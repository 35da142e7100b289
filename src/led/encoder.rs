//! LED frame encoder with single-frame-in-flight transmission.
//!
//! `encode` writes into a staging bitstream owned by the encoder. `transmit`
//! waits (busy-polling) until the previous frame's completion has been
//! observed, marks the channel busy and hands the staging buffer over; the
//! channel leaves its spare buffer behind for the next encode. Two
//! bitstreams are never interleaved.

use std::sync::Arc;

use tracing::{debug, trace};

use super::color::ColorFrame;
use super::protocol::{encode_into, Bitstream, LedBackend, SymbolShape};
use crate::error::{PipelineError, Result};
use crate::hal::irq::IrqLine;
use crate::hal::{TransferComplete, TransmitChannel};

#[derive(Debug, Default)]
struct TransmitFlags {
    /// A bitstream is on the wire
    busy: bool,

    /// Completions observed since start
    completed: u64,
}

#[derive(Debug, Default)]
struct TransmitIrq {
    line: IrqLine<TransmitFlags>,
}

impl TransferComplete for TransmitIrq {
    fn on_transfer_complete(&self) {
        let mut flags = self.line.enter_handler();
        flags.busy = false;
        flags.completed += 1;
    }
}

/// Encodes color frames for one backend and transmits them over a channel
pub struct LedEncoder<X> {
    backend: LedBackend,
    channel: X,
    irq: Arc<TransmitIrq>,
    staging: Bitstream,
    pixel_count: usize,
    frames_started: u64,
}

impl<X: TransmitChannel> LedEncoder<X> {
    pub fn new(backend: LedBackend, pixel_count: usize, mut channel: X) -> Result<Self> {
        if pixel_count == 0 {
            return Err(PipelineError::InvalidInput("pixel count must be positive"));
        }

        let irq = Arc::new(TransmitIrq::default());
        channel.on_transmit_complete(irq.clone());
        debug!(
            backend = ?backend.kind(),
            pixel_count,
            symbol_period_ns = backend.symbol_period_ns(),
            "led encoder ready"
        );

        Ok(Self {
            backend,
            channel,
            irq,
            staging: Bitstream::with_capacity(pixel_count),
            pixel_count,
            frames_started: 0,
        })
    }

    /// Encode `frame` into the staging buffer
    pub fn encode(&mut self, frame: &ColorFrame) -> Result<&Bitstream> {
        if frame.is_empty() {
            return Err(PipelineError::InvalidInput("empty color frame"));
        }
        if frame.len() != self.pixel_count {
            return Err(PipelineError::InvalidInput("color frame size mismatch"));
        }
        encode_into(&self.backend, frame.pixels(), &mut self.staging);
        Ok(&self.staging)
    }

    /// True when no transmission is in flight
    pub fn is_ready(&self) -> bool {
        !self.irq.line.mask().busy
    }

    /// Send the staged bitstream, waiting for the previous one to finish
    pub fn transmit(&mut self) -> Result<()> {
        if self.staging.is_empty() {
            return Err(PipelineError::InvalidInput("no encoded frame to transmit"));
        }

        while !self.is_ready() {
            std::hint::spin_loop();
        }

        self.irq.line.mask().busy = true;
        self.channel.start_transmit(&mut self.staging);
        self.frames_started += 1;
        trace!(frame = self.frames_started, "transmit started");
        Ok(())
    }

    /// Encode and transmit in one step
    pub fn send(&mut self, frame: &ColorFrame) -> Result<()> {
        self.encode(frame)?;
        self.transmit()
    }

    /// Frames handed to the channel
    pub fn frames_started(&self) -> u64 {
        self.frames_started
    }

    /// Transmissions the channel has reported complete
    pub fn frames_completed(&self) -> u64 {
        self.irq.line.mask().completed
    }

    pub fn backend(&self) -> &LedBackend {
        &self.backend
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn channel(&self) -> &X {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::protocol::{BackendKind, BITS_PER_PIXEL, LATCH_US};
    use crate::led::Rgb;

    /// Channel that holds every stream until told to complete
    #[derive(Default)]
    struct ManualChannel {
        handler: Option<Arc<dyn TransferComplete>>,
        started: Vec<Bitstream>,
    }

    impl ManualChannel {
        fn complete(&self) {
            if let Some(handler) = &self.handler {
                handler.on_transfer_complete();
            }
        }
    }

    impl TransmitChannel for ManualChannel {
        fn on_transmit_complete(&mut self, handler: Arc<dyn TransferComplete>) {
            self.handler = Some(handler);
        }

        fn start_transmit(&mut self, source: &mut Bitstream) {
            self.started.push(std::mem::take(source));
        }
    }

    fn encoder(pixels: usize) -> LedEncoder<ManualChannel> {
        let backend = LedBackend::from_kind(BackendKind::Spi, LATCH_US);
        LedEncoder::new(backend, pixels, ManualChannel::default()).unwrap()
    }

    #[test]
    fn test_zero_pixels_rejected() {
        let backend = LedBackend::from_kind(BackendKind::Pwm, LATCH_US);
        assert!(LedEncoder::new(backend, 0, ManualChannel::default()).is_err());
    }

    #[test]
    fn test_encode_symbol_count() {
        let mut encoder = encoder(3);
        let frame = ColorFrame::from_packed(&[0x010203, 0xFFFFFF, 0]).unwrap();
        let trailer_len = encoder.backend().trailer_len();

        let stream = encoder.encode(&frame).unwrap();
        assert_eq!(stream.symbols().len(), 3 * BITS_PER_PIXEL);
        assert_eq!(stream.trailer().len, trailer_len);
    }

    #[test]
    fn test_encode_rejects_size_mismatch() {
        let mut encoder = encoder(3);
        let frame = ColorFrame::new(2).unwrap();
        assert!(encoder.encode(&frame).is_err());
    }

    #[test]
    fn test_transmit_without_encode_rejected() {
        let mut encoder = encoder(1);
        assert_eq!(
            encoder.transmit(),
            Err(PipelineError::InvalidInput("no encoded frame to transmit"))
        );
    }

    #[test]
    fn test_busy_until_completion() {
        let mut encoder = encoder(1);
        let mut frame = ColorFrame::new(1).unwrap();
        frame.set(0, Rgb::new(1, 2, 3));

        assert!(encoder.is_ready());
        encoder.send(&frame).unwrap();
        assert!(!encoder.is_ready());
        assert_eq!(encoder.frames_completed(), 0);

        encoder.channel().complete();
        assert!(encoder.is_ready());
        assert_eq!(encoder.frames_completed(), 1);
        assert_eq!(encoder.channel().started.len(), 1);
    }

    #[test]
    fn test_transmit_waits_for_previous_frame() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        let mut encoder = encoder(1);
        let frame = ColorFrame::new(1).unwrap();
        encoder.send(&frame).unwrap();

        let irq = Arc::clone(&encoder.irq);
        let released = Arc::new(AtomicBool::new(false));
        let completer = {
            let released = Arc::clone(&released);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                released.store(true, Ordering::SeqCst);
                irq.on_transfer_complete();
            })
        };

        encoder.send(&frame).unwrap();
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(encoder.channel().started.len(), 2);
        completer.join().unwrap();
    }
}
