//! Software transfer engines standing in for the two DMA channels.
//!
//! `DmaCapture` behaves like a peripheral-triggered channel with a byte
//! count: every converted sample lands at the next destination address, and
//! when the count runs out the request line clears itself and completion
//! fires. Samples converted while the request line is clear are dropped.
//!
//! `DmaTransmit` clocks a bitstream out to a `SymbolSink` on a worker thread,
//! taking as long as the symbols would take on the wire, then fires
//! completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::sink::SymbolSink;
use super::{CaptureChannel, TransferComplete, TransmitChannel};
use crate::capture::{SampleBanks, Slot};
use crate::led::protocol::Bitstream;

/// Channel registers for the capture engine
struct CaptureRegs<const N: usize> {
    banks: Option<Arc<SampleBanks<N>>>,
    dest: Slot,
    index: usize,
    request_enabled: bool,
    sample_rate_hz: u32,
    handler: Option<Arc<dyn TransferComplete>>,
}

struct CaptureEngine<const N: usize> {
    regs: Mutex<CaptureRegs<N>>,
    transfers_completed: AtomicU64,
    samples_dropped: AtomicU64,
}

impl<const N: usize> CaptureEngine<N> {
    fn convert(&self, samples: &[u16]) -> usize {
        let (accepted, completed) = {
            let mut regs = self.regs.lock();
            let banks = match (&regs.banks, regs.request_enabled) {
                (Some(banks), true) => Arc::clone(banks),
                _ => {
                    self.samples_dropped
                        .fetch_add(samples.len() as u64, Ordering::Relaxed);
                    return 0;
                }
            };

            let start = regs.index;
            let take = (N - start).min(samples.len());
            banks.lock(regs.dest)[start..start + take].copy_from_slice(&samples[..take]);
            regs.index += take;

            let completed = regs.index == N;
            if completed {
                // Request line self-clears; software must restart
                regs.request_enabled = false;
                regs.index = 0;
            }
            let handler = if completed { regs.handler.clone() } else { None };
            (take, completed.then_some(handler))
        };

        let overflow = samples.len() - accepted;
        if overflow > 0 {
            self.samples_dropped
                .fetch_add(overflow as u64, Ordering::Relaxed);
        }

        if let Some(handler) = completed {
            self.transfers_completed.fetch_add(1, Ordering::Relaxed);
            if let Some(handler) = handler {
                handler.on_transfer_complete();
            }
        }
        accepted
    }
}

/// Software capture channel fed by a timer-paced converter
pub struct DmaCapture<const N: usize> {
    engine: Arc<CaptureEngine<N>>,
}

impl<const N: usize> DmaCapture<N> {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(CaptureEngine {
                regs: Mutex::new(CaptureRegs {
                    banks: None,
                    dest: Slot::A,
                    index: 0,
                    request_enabled: false,
                    sample_rate_hz: 0,
                    handler: None,
                }),
                transfers_completed: AtomicU64::new(0),
                samples_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Converter-side handle that pushes samples into this channel
    pub fn feeder(&self) -> CaptureFeeder<N> {
        CaptureFeeder {
            engine: Arc::clone(&self.engine),
        }
    }

    /// Blocks completed since start
    pub fn transfers_completed(&self) -> u64 {
        self.engine.transfers_completed.load(Ordering::Relaxed)
    }

    /// True while the request line is enabled
    pub fn is_running(&self) -> bool {
        self.engine.regs.lock().request_enabled
    }
}

impl<const N: usize> Default for DmaCapture<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CaptureChannel<N> for DmaCapture<N> {
    fn on_capture_complete(&mut self, handler: Arc<dyn TransferComplete>) {
        self.engine.regs.lock().handler = Some(handler);
    }

    fn start_capture(&mut self, banks: Arc<SampleBanks<N>>, dest: Slot, sample_rate_hz: u32) {
        let mut regs = self.engine.regs.lock();
        regs.banks = Some(banks);
        regs.dest = dest;
        regs.index = 0;
        regs.sample_rate_hz = sample_rate_hz;
        regs.request_enabled = true;
    }

    fn retarget_capture(&mut self, dest: Slot) {
        self.engine.regs.lock().dest = dest;
    }

    fn restart_capture(&mut self) {
        let mut regs = self.engine.regs.lock();
        regs.index = 0;
        regs.request_enabled = true;
    }

    fn samples_dropped(&self) -> u64 {
        self.engine.samples_dropped.load(Ordering::Relaxed)
    }
}

/// Converter output feeding a `DmaCapture`
#[derive(Clone)]
pub struct CaptureFeeder<const N: usize> {
    engine: Arc<CaptureEngine<N>>,
}

impl<const N: usize> CaptureFeeder<N> {
    /// Deliver converted samples; returns how many were written
    pub fn convert(&self, samples: &[u16]) -> usize {
        self.engine.convert(samples)
    }

    /// Rate the channel was started at (0 before start)
    pub fn sample_rate_hz(&self) -> u32 {
        self.engine.regs.lock().sample_rate_hz
    }
}

/// Software transmit channel clocking symbols into a sink
pub struct DmaTransmit {
    requests: Sender<Bitstream>,
    recycled: Receiver<Bitstream>,
    spare: Option<Bitstream>,
    handler: Arc<Mutex<Option<Arc<dyn TransferComplete>>>>,
    frames_sent: Arc<AtomicU64>,
    pixel_capacity: usize,
    _worker: thread::JoinHandle<()>,
}

impl DmaTransmit {
    /// Start the transmit worker.
    ///
    /// `symbol_period_ns` paces the output; `pixel_count` sizes the spare
    /// buffer swapped in on each transmit.
    pub fn spawn<S>(mut sink: S, symbol_period_ns: u32, pixel_count: usize) -> Self
    where
        S: SymbolSink + 'static,
    {
        let (requests, pending) = bounded::<Bitstream>(1);
        let (recycle, recycled) = bounded::<Bitstream>(1);
        let handler: Arc<Mutex<Option<Arc<dyn TransferComplete>>>> = Arc::new(Mutex::new(None));
        let frames_sent = Arc::new(AtomicU64::new(0));

        let worker = {
            let handler = Arc::clone(&handler);
            let frames_sent = Arc::clone(&frames_sent);
            thread::spawn(move || {
                for stream in pending.iter() {
                    sink.write_frame(&stream);

                    let wire_ns = stream.wire_len() as u64 * symbol_period_ns as u64;
                    thread::sleep(Duration::from_nanos(wire_ns));

                    let count = frames_sent.fetch_add(1, Ordering::Relaxed) + 1;
                    trace!(frame = count, symbols = stream.wire_len(), "transmit complete");

                    // Hand the buffer back before signalling so the next
                    // transmit always finds it
                    if recycle.send(stream).is_err() {
                        debug!("transmit owner gone, buffer not recycled");
                    }
                    let handler = handler.lock().clone();
                    if let Some(handler) = handler {
                        handler.on_transfer_complete();
                    }
                }
                debug!("transmit worker stopped");
            })
        };

        Self {
            requests,
            recycled,
            spare: Some(Bitstream::with_capacity(pixel_count)),
            handler,
            frames_sent,
            pixel_capacity: pixel_count,
            _worker: worker,
        }
    }

    /// Transmissions completed since spawn
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}

impl TransmitChannel for DmaTransmit {
    fn on_transmit_complete(&mut self, handler: Arc<dyn TransferComplete>) {
        *self.handler.lock() = Some(handler);
    }

    fn start_transmit(&mut self, source: &mut Bitstream) {
        let mut outgoing = match self.spare.take() {
            Some(spare) => spare,
            None => self.recycled.try_recv().unwrap_or_else(|_| {
                warn!("transmit buffer not returned, allocating a replacement");
                Bitstream::with_capacity(self.pixel_capacity)
            }),
        };
        std::mem::swap(&mut outgoing, source);
        source.clear();

        if self.requests.send(outgoing).is_err() {
            error!("transmit worker gone, frame dropped");
            let handler = self.handler.lock().clone();
            if let Some(handler) = handler {
                handler.on_transfer_complete();
            }
        }
    }
}
