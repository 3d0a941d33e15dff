//! Block compressor: predictor + Laplace model + range coder over one batch.
//!
//! Payload format (little-endian):
//! ```text
//! [flags: 1 byte]   bits 0..4 quantization shift, bit 7 keyframe, bits 5..6 zero
//! [count: u16]      number of samples in the block
//! [keyframe: 32]    only with the keyframe flag: orientation then rate,
//!                   each 4 x i32 Q2.30 (w, x, y, z)
//! [range coded]     3 residual symbols per coded sample; absent when no
//!                   sample is coded
//! ```
//!
//! A block is all-or-nothing: the caller's [`PredictorState`] is read, never
//! written, and the successor state is returned only with a complete payload.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::encoding::laplace::{icdf, symbol_range};
use crate::encoding::range_coder::{RangeDecoder, RangeEncoder, FLUSH_BYTES};
use crate::error::{Error, Result};
use crate::predictors::{PredictorState, Residual, CHANNELS};
use crate::quat::{FixedQuat, FRAC_BITS};

/// Flags byte, sample count.
pub const HEADER_LEN: usize = 3;
/// Raw orientation and rate of a keyframe.
pub const KEYFRAME_LEN: usize = 32;
/// Largest batch a header can describe.
pub const MAX_BATCH: usize = u16::MAX as usize;

const KEYFRAME_FLAG: u8 = 0x80;
const RESERVED_BITS: u8 = 0x60;
const SHIFT_MASK: u8 = 0x1F;
const QUAT_BYTES: usize = 16;

/// Quantization precision for a block.
///
/// Residuals are the rotation-vector components of the prediction error in
/// Q2.30 shifted right by `shift`, so one symbol step is `2^(shift - 30)`
/// radians. A small shift keeps more detail but overflows the symbol range
/// sooner; a large shift trades detail for headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PrecisionProfile {
    shift: u8,
}

impl PrecisionProfile {
    pub const MIN_SHIFT: u8 = 1;
    pub const MAX_SHIFT: u8 = 23;

    /// Fine quantization, tried first (2^-16 rad steps, ±0.0019 rad headroom).
    pub const PREFERRED: PrecisionProfile = PrecisionProfile { shift: 14 };
    /// Coarse quantization for fast motion (2^-10 rad steps, ±0.124 rad headroom).
    pub const FALLBACK: PrecisionProfile = PrecisionProfile { shift: 20 };
    /// Order in which a writer tries the profiles.
    pub const DEFAULT_ORDER: [PrecisionProfile; 2] = [Self::PREFERRED, Self::FALLBACK];

    pub fn new(shift: u8) -> Result<Self> {
        if (Self::MIN_SHIFT..=Self::MAX_SHIFT).contains(&shift) {
            Ok(Self { shift })
        } else {
            Err(Error::InvalidProfile(shift))
        }
    }

    pub fn shift(self) -> u8 {
        self.shift
    }

    /// Size of one symbol step in radians.
    pub fn quantum(self) -> f64 {
        1.0 / (1u64 << (FRAC_BITS - self.shift as u32)) as f64
    }
}

impl Default for PrecisionProfile {
    fn default() -> Self {
        Self::PREFERRED
    }
}

impl TryFrom<u8> for PrecisionProfile {
    type Error = Error;

    fn try_from(shift: u8) -> Result<Self> {
        Self::new(shift)
    }
}

impl From<PrecisionProfile> for u8 {
    fn from(profile: PrecisionProfile) -> u8 {
        profile.shift
    }
}

/// Outcome of a successful [`compress_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlock {
    /// Payload bytes at the start of the output buffer.
    pub bytes_written: usize,
    /// Predictor state after the block; replaces the caller's state.
    pub state: PredictorState,
    /// Profile the block was coded with.
    pub profile: PrecisionProfile,
}

/// Outcome of a successful [`decompress_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressedBlock {
    /// Samples written to the front of the output buffer.
    pub samples: usize,
    /// Payload bytes consumed.
    pub bytes_read: usize,
    /// Predictor state after the block.
    pub state: PredictorState,
    pub profile: PrecisionProfile,
}

/// Upper bound on the payload size of a block of `samples` samples.
///
/// Every symbol carries at least 2^-15 of the probability mass, so it costs
/// at most 15 bits plus rounding.
pub const fn max_payload_len(samples: usize) -> usize {
    HEADER_LEN + KEYFRAME_LEN + 2 * CHANNELS * samples + FLUSH_BYTES + 1
}

fn write_quat(dst: &mut [u8], q: &FixedQuat) {
    LittleEndian::write_i32_into(&q.to_bits(FRAC_BITS), &mut dst[..QUAT_BYTES]);
}

fn read_quat(src: &[u8]) -> FixedQuat {
    let mut bits = [0i32; 4];
    LittleEndian::read_i32_into(&src[..QUAT_BYTES], &mut bits);
    FixedQuat::from_bits(bits, FRAC_BITS)
}

/// Compresses `samples` at `profile` into `output`.
///
/// `scratch` must hold `3 * samples.len()` residuals; this is checked before
/// `output` is touched. If `state` has never been primed the first sample is
/// stored raw as a keyframe. On any error the contents of `output` are
/// undefined and `state` is still the state to use next.
pub fn compress_block(
    state: &PredictorState,
    samples: &[FixedQuat],
    profile: PrecisionProfile,
    output: &mut [u8],
    scratch: &mut [i8],
) -> Result<CompressedBlock> {
    let n = samples.len();
    if n > MAX_BATCH {
        return Err(Error::BatchTooLarge(n));
    }
    let required = n * CHANNELS;
    if scratch.len() < required {
        return Err(Error::ScratchBufferTooSmall {
            required,
            available: scratch.len(),
        });
    }

    let mut work = *state;
    let keyframe = if !work.is_primed() && n > 0 {
        let rate = match samples.get(1) {
            Some(next) => samples[0].delta_to(*next),
            None => FixedQuat::IDENTITY,
        };
        work = PredictorState::primed(samples[0], rate);
        Some((samples[0], rate))
    } else {
        None
    };
    let first_coded = if keyframe.is_some() { 1 } else { 0 };

    // Pass 1: quantize everything before emitting a single byte.
    for (i, actual) in samples.iter().enumerate().skip(first_coded) {
        let predicted = work.predict();
        let residual = PredictorState::quantize(actual, &predicted, profile)
            .map_err(|channel| Error::QuantizationOverflow { sample: i, channel })?;
        scratch[i * CHANNELS..(i + 1) * CHANNELS].copy_from_slice(&residual);
        work.advance(
            PredictorState::reconstruct(&predicted, &residual, profile),
            &residual,
        );
    }

    let header_len = HEADER_LEN + keyframe.map_or(0, |_| KEYFRAME_LEN);
    if output.len() < header_len {
        return Err(Error::OutputBufferExhausted);
    }
    output[0] = profile.shift() | keyframe.map_or(0, |_| KEYFRAME_FLAG);
    LittleEndian::write_u16(&mut output[1..HEADER_LEN], n as u16);
    if let Some((orientation, rate)) = keyframe {
        write_quat(&mut output[HEADER_LEN..], &orientation);
        write_quat(&mut output[HEADER_LEN + QUAT_BYTES..], &rate);
    }

    // Pass 2: entropy code, adapting the variance buckets as we go.
    let mut bytes_written = header_len;
    if first_coded < n {
        let mut encoder = RangeEncoder::new(&mut output[header_len..]);
        for chunk in scratch[first_coded * CHANNELS..required].chunks_exact(CHANNELS) {
            let residual: Residual = [chunk[0], chunk[1], chunk[2]];
            for (channel, &symbol) in residual.iter().enumerate() {
                let (start, count) = symbol_range(symbol as i32, work.bucket(channel));
                encoder.encode(start, count)?;
            }
            work.observe(&residual);
        }
        bytes_written += encoder.finish()?;
    }

    Ok(CompressedBlock {
        bytes_written,
        state: work,
        profile,
    })
}

/// Tries each profile in order and returns the first success.
///
/// Failures that no profile can fix (scratch capacity, batch size) are
/// returned immediately; otherwise the error of the last profile is
/// returned.
pub fn compress_with_fallback(
    state: &PredictorState,
    samples: &[FixedQuat],
    profiles: &[PrecisionProfile],
    output: &mut [u8],
    scratch: &mut [i8],
) -> Result<CompressedBlock> {
    let mut last_error = Error::NoProfiles;
    for &profile in profiles {
        match compress_block(state, samples, profile, output, scratch) {
            Ok(block) => return Ok(block),
            Err(e @ (Error::ScratchBufferTooSmall { .. } | Error::BatchTooLarge(_))) => {
                return Err(e)
            }
            Err(e) => {
                log::debug!(
                    "profile shift {} failed for {} samples: {}",
                    profile.shift(),
                    samples.len(),
                    e
                );
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// Decodes one payload produced by [`compress_block`].
///
/// Reconstructed orientations go to the front of `output`. The returned
/// state equals the encoder's state after the same block.
pub fn decompress_block(
    state: &PredictorState,
    payload: &[u8],
    output: &mut [FixedQuat],
) -> Result<DecompressedBlock> {
    if payload.len() < HEADER_LEN {
        return Err(Error::TruncatedPayload);
    }
    let flags = payload[0];
    if flags & RESERVED_BITS != 0 {
        return Err(Error::InvalidPayload);
    }
    let profile = PrecisionProfile::new(flags & SHIFT_MASK).map_err(|_| Error::InvalidPayload)?;
    let keyframe = flags & KEYFRAME_FLAG != 0;
    let n = LittleEndian::read_u16(&payload[1..HEADER_LEN]) as usize;
    if output.len() < n {
        return Err(Error::SampleBufferTooSmall {
            required: n,
            available: output.len(),
        });
    }

    let mut work = *state;
    let mut offset = HEADER_LEN;
    let mut first_coded = 0;
    if keyframe {
        if n == 0 {
            return Err(Error::InvalidPayload);
        }
        let body = payload
            .get(HEADER_LEN..HEADER_LEN + KEYFRAME_LEN)
            .ok_or(Error::TruncatedPayload)?;
        let orientation = read_quat(body);
        let rate = read_quat(&body[QUAT_BYTES..]);
        work = PredictorState::primed(orientation, rate);
        output[0] = orientation;
        offset += KEYFRAME_LEN;
        first_coded = 1;
    } else if n > 0 && !work.is_primed() {
        return Err(Error::MissingKeyframe);
    }

    let mut bytes_read = offset;
    if first_coded < n {
        let mut decoder = RangeDecoder::new(&payload[offset..]);
        for slot in output[first_coded..n].iter_mut() {
            let mut residual: Residual = [0; CHANNELS];
            for (channel, r) in residual.iter_mut().enumerate() {
                let bucket = work.bucket(channel);
                let symbol = icdf(decoder.scaled_value(), bucket);
                let (start, count) = symbol_range(symbol, bucket);
                decoder.consume(start, count);
                *r = symbol as i8;
            }
            let predicted = work.predict();
            let reconstructed = PredictorState::reconstruct(&predicted, &residual, profile);
            work = work.commit(reconstructed, &residual);
            *slot = reconstructed;
        }
        if decoder.is_overrun() {
            return Err(Error::TruncatedPayload);
        }
        bytes_read += decoder.bytes_consumed();
    }

    Ok(DecompressedBlock {
        samples: n,
        bytes_read,
        state: work,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quat::RotationVector;

    fn spin(n: usize, step: (f64, f64, f64)) -> Vec<FixedQuat> {
        let rate = FixedQuat::from_rotation_vector(RotationVector::from_f64(step.0, step.1, step.2));
        let mut q = FixedQuat::from_f64(0.8, 0.0, 0.6, 0.0);
        (0..n)
            .map(|_| {
                let current = q;
                q = q * rate;
                current
            })
            .collect()
    }

    #[test]
    fn profile_bounds() {
        assert!(PrecisionProfile::new(0).is_err());
        assert!(PrecisionProfile::new(24).is_err());
        assert_eq!(PrecisionProfile::new(14).unwrap(), PrecisionProfile::PREFERRED);
        assert_eq!(PrecisionProfile::FALLBACK.quantum(), 1.0 / 1024.0);
        assert_eq!(u8::from(PrecisionProfile::FALLBACK), 20);
    }

    #[test]
    fn header_layout_with_keyframe() {
        let samples = spin(10, (0.001, 0.0, 0.002));
        let mut out = [0u8; 256];
        let mut scratch = [0i8; 30];
        let block = compress_block(
            &PredictorState::new(),
            &samples,
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();

        assert_eq!(out[0], 14 | 0x80);
        assert_eq!(LittleEndian::read_u16(&out[1..3]), 10);
        assert_eq!(read_quat(&out[3..19]), samples[0]);
        assert!(block.bytes_written > HEADER_LEN + KEYFRAME_LEN);
        assert!(block.state.is_primed());
    }

    #[test]
    fn primed_state_skips_keyframe() {
        let samples = spin(20, (0.001, 0.0, 0.0));
        let mut out = [0u8; 256];
        let mut scratch = [0i8; 60];
        let first = compress_block(
            &PredictorState::new(),
            &samples[..10],
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();
        compress_block(
            &first.state,
            &samples[10..],
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();
        assert_eq!(out[0] & KEYFRAME_FLAG, 0);
    }

    #[test]
    fn single_sample_keyframe_has_no_coded_stream() {
        let samples = spin(1, (0.0, 0.0, 0.0));
        let mut out = [0u8; 64];
        let mut scratch = [0i8; 3];
        let block = compress_block(
            &PredictorState::new(),
            &samples,
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();
        assert_eq!(block.bytes_written, HEADER_LEN + KEYFRAME_LEN);
        assert_eq!(block.state.rate(), FixedQuat::IDENTITY);

        let mut decoded = [FixedQuat::IDENTITY; 1];
        let back =
            decompress_block(&PredictorState::new(), &out[..block.bytes_written], &mut decoded)
                .unwrap();
        assert_eq!(decoded[0], samples[0]);
        assert_eq!(back.state, block.state);
    }

    #[test]
    fn empty_batch_is_header_only() {
        let mut out = [0u8; 8];
        let block = compress_block(
            &PredictorState::new(),
            &[],
            PrecisionProfile::FALLBACK,
            &mut out,
            &mut [],
        )
        .unwrap();
        assert_eq!(block.bytes_written, HEADER_LEN);
        assert_eq!(block.state, PredictorState::new());
    }

    #[test]
    fn delta_block_needs_primed_decoder() {
        let samples = spin(8, (0.002, 0.001, 0.0));
        let mut out = [0u8; 256];
        let mut scratch = [0i8; 24];
        let first = compress_block(
            &PredictorState::new(),
            &samples[..4],
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();
        let second = compress_block(
            &first.state,
            &samples[4..],
            PrecisionProfile::PREFERRED,
            &mut out,
            &mut scratch,
        )
        .unwrap();
        let mut decoded = [FixedQuat::IDENTITY; 4];
        assert_eq!(
            decompress_block(
                &PredictorState::new(),
                &out[..second.bytes_written],
                &mut decoded
            ),
            Err(Error::MissingKeyframe)
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let mut decoded = [FixedQuat::IDENTITY; 4];
        let state = PredictorState::new();
        assert_eq!(
            decompress_block(&state, &[14], &mut decoded),
            Err(Error::TruncatedPayload)
        );
        assert_eq!(
            decompress_block(&state, &[14 | 0x20, 0, 0], &mut decoded),
            Err(Error::InvalidPayload)
        );
        assert_eq!(
            decompress_block(&state, &[0, 0, 0], &mut decoded),
            Err(Error::InvalidPayload)
        );
        assert_eq!(
            decompress_block(&state, &[14 | 0x80, 2, 0, 1, 2], &mut decoded),
            Err(Error::TruncatedPayload)
        );
        assert_eq!(
            decompress_block(&state, &[14, 9, 0], &mut decoded),
            Err(Error::SampleBufferTooSmall {
                required: 9,
                available: 4
            })
        );
    }

    #[test]
    fn fallback_requires_profiles() {
        let samples = spin(4, (0.0, 0.0, 0.0));
        let mut out = [0u8; 128];
        let mut scratch = [0i8; 12];
        assert_eq!(
            compress_with_fallback(&PredictorState::new(), &samples, &[], &mut out, &mut scratch),
            Err(Error::NoProfiles)
        );
    }
}
