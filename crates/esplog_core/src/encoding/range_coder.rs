use crate::encoding::laplace::SCALE_BITS;
use crate::error::{Error, Result};

/// Renormalization threshold: a byte is shifted out whenever the range drops
/// below 2^24.
const TOP: u32 = 1 << 24;
/// Bytes written by [`RangeEncoder::finish`] and read by [`RangeDecoder::new`].
pub const FLUSH_BYTES: usize = 5;

/// Carry-propagating range encoder over 15-bit frequency intervals.
///
/// Writes into a caller-owned buffer. `low` keeps one carry bit above its
/// 32-bit window; a carry is resolved against the pending `cache` byte and
/// the run of `0xFF` bytes that follows it before anything is stored.
pub struct RangeEncoder<'a> {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    output: &'a mut [u8],
    pos: usize,
}

impl<'a> RangeEncoder<'a> {
    pub fn new(output: &'a mut [u8]) -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            cache: 0,
            cache_size: 1,
            output,
            pos: 0,
        }
    }

    /// Narrows the interval to `[cum_freq, cum_freq + freq)` out of `2^15`.
    ///
    /// Fails with [`Error::OutputBufferExhausted`] when a completed byte has
    /// no room left; the encoder must be discarded afterwards.
    pub fn encode(&mut self, cum_freq: u32, freq: u32) -> Result<()> {
        debug_assert!(freq > 0, "zero-frequency symbols cannot be coded");
        debug_assert!(cum_freq + freq <= 1 << SCALE_BITS);

        let r = self.range >> SCALE_BITS;
        self.low += r as u64 * cum_freq as u64;
        self.range = r * freq;

        while self.range < TOP {
            self.range <<= 8;
            self.shift_low()?;
        }
        Ok(())
    }

    /// Flushes the remaining state and returns the number of bytes written.
    pub fn finish(mut self) -> Result<usize> {
        for _ in 0..FLUSH_BYTES {
            self.shift_low()?;
        }
        Ok(self.pos)
    }

    /// Bytes committed to the output so far.
    pub fn bytes_written(&self) -> usize {
        self.pos
    }

    fn shift_low(&mut self) -> Result<()> {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut pending = self.cache;
            loop {
                self.emit(pending.wrapping_add(carry))?;
                pending = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low & 0x00FF_FFFF) << 8;
        Ok(())
    }

    fn emit(&mut self, byte: u8) -> Result<()> {
        let slot = self
            .output
            .get_mut(self.pos)
            .ok_or(Error::OutputBufferExhausted)?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }
}

/// Range decoder mirroring [`RangeEncoder`].
///
/// Reads past the end of the input yield zero bytes and mark the decoder as
/// overrun; a well-formed stream is consumed exactly.
pub struct RangeDecoder<'a> {
    range: u32,
    code: u32,
    input: &'a [u8],
    pos: usize,
    overrun: bool,
}

impl<'a> RangeDecoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        let mut decoder = Self {
            range: u32::MAX,
            code: 0,
            input,
            pos: 0,
            overrun: false,
        };

        for _ in 0..FLUSH_BYTES {
            decoder.code = (decoder.code << 8) | decoder.next_byte() as u32;
        }

        decoder
    }

    fn next_byte(&mut self) -> u8 {
        match self.input.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                b
            }
            None => {
                self.overrun = true;
                0
            }
        }
    }

    /// Position of the next symbol within `[0, 2^15)`; look it up with
    /// [`icdf`](crate::encoding::laplace::icdf).
    pub fn scaled_value(&self) -> u32 {
        let r = self.range >> SCALE_BITS;
        (self.code / r).min((1 << SCALE_BITS) - 1)
    }

    /// Removes the symbol occupying `[cum_freq, cum_freq + freq)`.
    pub fn consume(&mut self, cum_freq: u32, freq: u32) {
        let r = self.range >> SCALE_BITS;
        self.code = self.code.wrapping_sub(r * cum_freq);
        self.range = r * freq;

        while self.range < TOP {
            self.code = (self.code << 8) | self.next_byte() as u32;
            self.range <<= 8;
        }
    }

    /// Bytes read from the input so far.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// True once the decoder has needed bytes beyond the input.
    pub fn is_overrun(&self) -> bool {
        self.overrun
    }
}
