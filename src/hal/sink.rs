//! Destinations for the transmitted symbol stream.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::led::color::Rgb;
use crate::led::protocol::{decode_into, Bitstream, LedBackend};

/// Receives each frame as the transmit channel clocks it out
pub trait SymbolSink: Send {
    fn write_frame(&mut self, stream: &Bitstream);
}

/// Discards every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SymbolSink for NullSink {
    fn write_frame(&mut self, _stream: &Bitstream) {}
}

/// Keeps a copy of every frame; clones share the same record
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Bitstream>>>,
}

impl RecordingSink {
    /// Every frame received so far, in order
    pub fn frames(&self) -> Vec<Bitstream> {
        self.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    /// Most recent frame, if any
    pub fn last(&self) -> Option<Bitstream> {
        self.frames.lock().last().cloned()
    }
}

impl SymbolSink for RecordingSink {
    fn write_frame(&mut self, stream: &Bitstream) {
        self.frames.lock().push(stream.clone());
    }
}

mod ansi {
    pub const RESET_COLOR: &str = "\x1b[0m";
    pub const CLEAR_TO_EOL: &str = "\x1b[0K";
}

/// Decodes each frame back to colors and draws the strip on one terminal line
pub struct TerminalPreview<W: Write + Send> {
    backend: LedBackend,
    out: W,
    decoded: Vec<u32>,
    line: String,
    failed: bool,
}

impl TerminalPreview<io::Stdout> {
    pub fn stdout(backend: LedBackend, pixel_count: usize) -> Self {
        Self::new(backend, pixel_count, io::stdout())
    }
}

impl<W: Write + Send> TerminalPreview<W> {
    pub fn new(backend: LedBackend, pixel_count: usize, out: W) -> Self {
        Self {
            backend,
            out,
            decoded: Vec::with_capacity(pixel_count),
            line: String::with_capacity(pixel_count * 24),
            failed: false,
        }
    }

    /// Consume the preview and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SymbolSink for TerminalPreview<W> {
    fn write_frame(&mut self, stream: &Bitstream) {
        if !decode_into(&self.backend, stream.symbols(), &mut self.decoded) {
            warn!("preview received an undecodable frame");
            return;
        }

        self.line.clear();
        self.line.push('\r');
        for &packed in &self.decoded {
            let rgb = Rgb::unpack(packed);
            let _ = write!(self.line, "\x1b[48;2;{};{};{}m  ", rgb.red, rgb.green, rgb.blue);
        }
        self.line.push_str(ansi::RESET_COLOR);
        self.line.push_str(ansi::CLEAR_TO_EOL);
        let _ = write!(self.line, " {:>3}px", self.decoded.len());

        let result = self
            .out
            .write_all(self.line.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            // Report once, keep the pipeline running
            if !self.failed {
                warn!("preview output failed: {}", e);
                self.failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::protocol::{encode_into, BackendKind, LATCH_US};

    #[test]
    fn test_recording_sink_shares_frames() {
        let mut sink = RecordingSink::default();
        let handle = sink.clone();
        sink.write_frame(&Bitstream::default());
        sink.write_frame(&Bitstream::default());
        assert_eq!(handle.frame_count(), 2);
    }

    #[test]
    fn test_preview_draws_decoded_colors() {
        let backend = LedBackend::from_kind(BackendKind::Pwm, LATCH_US);
        let mut stream = Bitstream::with_capacity(2);
        encode_into(&backend, &[0xFF0000, 0x0000FF], &mut stream);

        let mut preview = TerminalPreview::new(backend, 2, Vec::new());
        preview.write_frame(&stream);

        let text = String::from_utf8(preview.into_inner()).unwrap();
        assert!(text.contains("\x1b[48;2;255;0;0m"));
        assert!(text.contains("\x1b[48;2;0;0;255m"));
        assert!(text.ends_with("  2px"));
    }

    #[test]
    fn test_preview_rejects_other_backend() {
        // PWM compare values are not SPI bytes
        let spi = LedBackend::from_kind(BackendKind::Spi, LATCH_US);
        let pwm = LedBackend::from_kind(BackendKind::Pwm, LATCH_US);
        let mut stream = Bitstream::with_capacity(1);
        encode_into(&pwm, &[0x123456], &mut stream);

        let mut preview = TerminalPreview::new(spi, 1, Vec::new());
        preview.write_frame(&stream);
        assert!(preview.into_inner().is_empty());
    }
}
