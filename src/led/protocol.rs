//! Addressable-LED timing protocol.
//!
//! Every color bit becomes one symbol: a high pulse followed by a low gap
//! inside a fixed period. A short pulse reads as logical 0, a long pulse as
//! logical 1. After the last pixel the line idles low for at least the latch
//! time so the strip shows the frame.
//!
//! Two backends produce the same logical stream:
//! - SPI burst: each symbol is one byte clocked out at the SPI bit rate, the
//!   high pulse being the run of leading one bits.
//! - Timer PWM: each symbol is one compare value loaded per timer period, the
//!   high pulse lasting `compare` timer ticks.

use std::iter;

use serde::Deserialize;

/// Symbols per pixel (8 bits each of green, red, blue)
pub const BITS_PER_PIXEL: usize = 24;

/// Minimum low time that latches the frame (µs)
pub const LATCH_US: u32 = 50;

/// Longest high pulse the strip still reads as logical 0 (ns)
pub const ZERO_HIGH_MAX_NS: u32 = 600;

/// Shortest high pulse the strip reads as logical 1 (ns)
pub const ONE_HIGH_MIN_NS: u32 = 650;

/// Physical shape of protocol symbols for one backend
pub trait SymbolShape {
    /// Symbol for one logical bit
    fn symbol(&self, bit: bool) -> u16;

    /// Symbol that holds the line low
    fn idle(&self) -> u16;

    /// Duration of one symbol on the wire (ns)
    fn symbol_period_ns(&self) -> u32;

    /// High pulse length of `symbol` (ns)
    fn high_time_ns(&self, symbol: u16) -> u32;

    /// Idle symbols needed to cover the latch time
    fn trailer_len(&self) -> usize;

    /// Logical bit carried by `symbol`, if it is one of the two bit shapes
    fn decode(&self, symbol: u16) -> Option<bool> {
        if symbol == self.symbol(true) {
            Some(true)
        } else if symbol == self.symbol(false) {
            Some(false)
        } else {
            None
        }
    }
}

/// How the strip itself classifies a pulse of `high_ns` inside `period_ns`
pub fn strip_reads(high_ns: u32, period_ns: u32) -> Option<bool> {
    if high_ns == 0 || high_ns >= period_ns {
        None
    } else if high_ns <= ZERO_HIGH_MAX_NS {
        Some(false)
    } else if high_ns >= ONE_HIGH_MIN_NS {
        Some(true)
    } else {
        None
    }
}

fn ceil_div(num: u64, den: u64) -> u64 {
    num.div_ceil(den)
}

/// Backend selection at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Serial burst bytes
    #[default]
    Spi,
    /// Timer PWM compare values
    Pwm,
}

/// SPI burst encoding: one byte per bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiBurst {
    /// SPI bit clock (Hz)
    pub bit_clock_hz: u32,

    /// Latch time covered by the trailer (µs)
    pub latch_us: u32,
}

impl SpiBurst {
    /// One high bit then seven low bits
    pub const ZERO: u8 = 0x80;
    /// Seven high bits then one low bit
    pub const ONE: u8 = 0xFE;

    fn bit_ns(&self) -> u64 {
        1_000_000_000 / self.bit_clock_hz.max(1) as u64
    }
}

impl Default for SpiBurst {
    fn default() -> Self {
        Self {
            bit_clock_hz: 6_000_000,
            latch_us: LATCH_US,
        }
    }
}

impl SymbolShape for SpiBurst {
    fn symbol(&self, bit: bool) -> u16 {
        if bit {
            Self::ONE as u16
        } else {
            Self::ZERO as u16
        }
    }

    fn idle(&self) -> u16 {
        0
    }

    fn symbol_period_ns(&self) -> u32 {
        (8 * self.bit_ns()) as u32
    }

    fn high_time_ns(&self, symbol: u16) -> u32 {
        ((symbol as u8).leading_ones() as u64 * self.bit_ns()) as u32
    }

    fn trailer_len(&self) -> usize {
        ceil_div(self.latch_us as u64 * 1000, self.symbol_period_ns().max(1) as u64) as usize
    }
}

/// Timer PWM encoding: one compare value per bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPwm {
    /// Timer counter clock after prescaling (Hz)
    pub timer_clock_hz: u32,

    /// Counter overflow value (period = modulo + 1 ticks)
    pub modulo: u16,

    /// Compare value for logical 0
    pub zero_compare: u16,

    /// Compare value for logical 1
    pub one_compare: u16,

    /// Latch time covered by the trailer (µs)
    pub latch_us: u32,
}

impl TimerPwm {
    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        ticks * 1_000_000_000 / self.timer_clock_hz.max(1) as u64
    }
}

impl Default for TimerPwm {
    fn default() -> Self {
        // 48 MHz / 16 prescaler, 5-tick period
        Self {
            timer_clock_hz: 3_000_000,
            modulo: 4,
            zero_compare: 1,
            one_compare: 3,
            latch_us: LATCH_US,
        }
    }
}

impl SymbolShape for TimerPwm {
    fn symbol(&self, bit: bool) -> u16 {
        if bit {
            self.one_compare
        } else {
            self.zero_compare
        }
    }

    fn idle(&self) -> u16 {
        0
    }

    fn symbol_period_ns(&self) -> u32 {
        self.ticks_to_ns(self.modulo as u64 + 1) as u32
    }

    fn high_time_ns(&self, symbol: u16) -> u32 {
        let ticks = (symbol as u64).min(self.modulo as u64 + 1);
        self.ticks_to_ns(ticks) as u32
    }

    fn trailer_len(&self) -> usize {
        ceil_div(self.latch_us as u64 * 1000, self.symbol_period_ns().max(1) as u64) as usize
    }
}

/// Backend variant chosen at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedBackend {
    SpiBurst(SpiBurst),
    TimerPwm(TimerPwm),
}

impl LedBackend {
    /// Default-timed backend of the given kind
    pub fn from_kind(kind: BackendKind, latch_us: u32) -> Self {
        match kind {
            BackendKind::Spi => LedBackend::SpiBurst(SpiBurst {
                latch_us,
                ..SpiBurst::default()
            }),
            BackendKind::Pwm => LedBackend::TimerPwm(TimerPwm {
                latch_us,
                ..TimerPwm::default()
            }),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            LedBackend::SpiBurst(_) => BackendKind::Spi,
            LedBackend::TimerPwm(_) => BackendKind::Pwm,
        }
    }

    fn shape(&self) -> &dyn SymbolShape {
        match self {
            LedBackend::SpiBurst(spi) => spi,
            LedBackend::TimerPwm(pwm) => pwm,
        }
    }
}

impl SymbolShape for LedBackend {
    fn symbol(&self, bit: bool) -> u16 {
        self.shape().symbol(bit)
    }

    fn idle(&self) -> u16 {
        self.shape().idle()
    }

    fn symbol_period_ns(&self) -> u32 {
        self.shape().symbol_period_ns()
    }

    fn high_time_ns(&self, symbol: u16) -> u32 {
        self.shape().high_time_ns(symbol)
    }

    fn trailer_len(&self) -> usize {
        self.shape().trailer_len()
    }
}

/// Idle period appended after the color symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trailer {
    /// Symbol repeated for the whole trailer
    pub symbol: u16,

    /// Number of repetitions
    pub len: usize,
}

/// Encoded symbol stream for one frame plus its latch trailer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitstream {
    symbols: Vec<u16>,
    trailer: Trailer,
}

impl Bitstream {
    /// Empty stream with room for `pixel_count` pixels
    pub fn with_capacity(pixel_count: usize) -> Self {
        Self {
            symbols: Vec::with_capacity(pixel_count * BITS_PER_PIXEL),
            trailer: Trailer::default(),
        }
    }

    /// Color symbols in wire order
    pub fn symbols(&self) -> &[u16] {
        &self.symbols
    }

    pub fn trailer(&self) -> Trailer {
        self.trailer
    }

    /// True when no frame has been encoded
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols on the wire, trailer included
    pub fn wire_len(&self) -> usize {
        self.symbols.len() + self.trailer.len
    }

    /// Every symbol on the wire, trailer included
    pub fn wire(&self) -> impl Iterator<Item = u16> + '_ {
        self.symbols
            .iter()
            .copied()
            .chain(iter::repeat(self.trailer.symbol).take(self.trailer.len))
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.trailer = Trailer::default();
    }
}

/// Encode packed colors into `out`, green then red then blue, MSB first
pub fn encode_into(shape: &impl SymbolShape, colors: &[u32], out: &mut Bitstream) {
    out.clear();
    let one = shape.symbol(true);
    let zero = shape.symbol(false);

    for &packed in colors {
        let grb = [(packed >> 8) as u8, (packed >> 16) as u8, packed as u8];
        for byte in grb {
            for bit in (0..8).rev() {
                let symbol = if (byte >> bit) & 1 == 1 { one } else { zero };
                out.symbols.push(symbol);
            }
        }
    }

    out.trailer = Trailer {
        symbol: shape.idle(),
        len: shape.trailer_len(),
    };
}

/// Decode color symbols back into packed colors.
///
/// Returns false if a symbol is not a bit shape or the count is not a whole
/// number of pixels.
pub fn decode_into(shape: &impl SymbolShape, symbols: &[u16], out: &mut Vec<u32>) -> bool {
    out.clear();
    if symbols.len() % BITS_PER_PIXEL != 0 {
        return false;
    }

    for pixel in symbols.chunks_exact(BITS_PER_PIXEL) {
        let mut grb: u32 = 0;
        for &symbol in pixel {
            match shape.decode(symbol) {
                Some(bit) => grb = (grb << 1) | bit as u32,
                None => return false,
            }
        }
        let green = (grb >> 16) & 0xFF;
        let red = (grb >> 8) & 0xFF;
        let blue = grb & 0xFF;
        out.push((red << 16) | (green << 8) | blue);
    }
    true
}
