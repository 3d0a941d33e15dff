//! EspLog container: a magic header followed by tagged blocks.
//!
//! ```text
//! Header       "EspLog0"
//! Gyro setup   tag 1, revision u8, samples_per_block u16
//! Time         tag 2, elapsed microseconds u32
//! Gyro data    tag 3, block compressor payload (self-delimiting)
//! Accel setup  tag 4, range u8
//! Accel data   tag 5, count u8, count * (x, y, z) i16
//! ```
//!
//! All multi-byte fields are little-endian. Writers fill a caller-owned
//! slice and return the number of bytes used.

use byteorder::{ByteOrder, LittleEndian};

use crate::compression::block::{
    compress_with_fallback, decompress_block, CompressedBlock, PrecisionProfile,
};
use crate::error::{Error, Result};
use crate::predictors::PredictorState;
use crate::quat::FixedQuat;

pub const MAGIC: &[u8; 7] = b"EspLog0";
pub const GYRO_SETUP_REVISION: u8 = 1;
pub const MAX_ACCEL_SAMPLES: usize = u8::MAX as usize;

/// Raw accelerometer reading (x, y, z).
pub type AccelSample = [i16; 3];

const GYRO_SETUP_LEN: usize = 4;
const TIME_LEN: usize = 5;
const ACCEL_SETUP_LEN: usize = 2;
const ACCEL_HEADER_LEN: usize = 2;
const ACCEL_SAMPLE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockTag {
    GyroSetup = 1,
    Time = 2,
    GyroData = 3,
    AccelSetup = 4,
    AccelData = 5,
}

impl TryFrom<u8> for BlockTag {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(BlockTag::GyroSetup),
            2 => Ok(BlockTag::Time),
            3 => Ok(BlockTag::GyroData),
            4 => Ok(BlockTag::AccelSetup),
            5 => Ok(BlockTag::AccelData),
            other => Err(Error::UnknownBlock(other)),
        }
    }
}

fn reserve(output: &mut [u8], len: usize) -> Result<&mut [u8]> {
    let available = output.len();
    output.get_mut(..len).ok_or(Error::BufferTooSmall {
        required: len,
        available,
    })
}

pub fn write_header(output: &mut [u8]) -> Result<usize> {
    reserve(output, MAGIC.len())?.copy_from_slice(MAGIC);
    Ok(MAGIC.len())
}

pub fn write_gyro_setup(output: &mut [u8], samples_per_block: u16) -> Result<usize> {
    let block = reserve(output, GYRO_SETUP_LEN)?;
    block[0] = BlockTag::GyroSetup as u8;
    block[1] = GYRO_SETUP_REVISION;
    LittleEndian::write_u16(&mut block[2..4], samples_per_block);
    Ok(GYRO_SETUP_LEN)
}

pub fn write_time_block(output: &mut [u8], elapsed_us: u32) -> Result<usize> {
    let block = reserve(output, TIME_LEN)?;
    block[0] = BlockTag::Time as u8;
    LittleEndian::write_u32(&mut block[1..5], elapsed_us);
    Ok(TIME_LEN)
}

/// Compresses `samples` into a gyro data block, trying `profiles` in order.
///
/// `*state` is replaced by the successor state only when the block is
/// complete; on error nothing in `output` counts as written.
pub fn write_gyro_data(
    state: &mut PredictorState,
    samples: &[FixedQuat],
    profiles: &[PrecisionProfile],
    output: &mut [u8],
    scratch: &mut [i8],
) -> Result<CompressedBlock> {
    let (tag, payload) = match output.split_first_mut() {
        Some(split) => split,
        None => {
            return Err(Error::BufferTooSmall {
                required: 1,
                available: 0,
            })
        }
    };
    *tag = BlockTag::GyroData as u8;
    let mut block = compress_with_fallback(state, samples, profiles, payload, scratch)?;
    block.bytes_written += 1;
    *state = block.state;
    Ok(block)
}

pub fn write_accel_setup(output: &mut [u8], range: u8) -> Result<usize> {
    let block = reserve(output, ACCEL_SETUP_LEN)?;
    block[0] = BlockTag::AccelSetup as u8;
    block[1] = range;
    Ok(ACCEL_SETUP_LEN)
}

pub fn write_accel_data(output: &mut [u8], samples: &[AccelSample]) -> Result<usize> {
    if samples.len() > MAX_ACCEL_SAMPLES {
        return Err(Error::TooManyAccelSamples(samples.len()));
    }
    let len = ACCEL_HEADER_LEN + ACCEL_SAMPLE_LEN * samples.len();
    let block = reserve(output, len)?;
    block[0] = BlockTag::AccelData as u8;
    block[1] = samples.len() as u8;
    for (dst, sample) in block[ACCEL_HEADER_LEN..]
        .chunks_exact_mut(ACCEL_SAMPLE_LEN)
        .zip(samples)
    {
        LittleEndian::write_i16_into(sample, dst);
    }
    Ok(len)
}

/// Checks the magic and returns the bytes after it.
pub fn read_header(input: &[u8]) -> Result<&[u8]> {
    match input.get(..MAGIC.len()) {
        Some(magic) if magic == MAGIC => Ok(&input[MAGIC.len()..]),
        Some(_) => Err(Error::BadMagic),
        None => Err(Error::TruncatedPayload),
    }
}

/// Borrowed view of the samples in an accel data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelData<'a> {
    raw: &'a [u8],
}

impl<'a> AccelData<'a> {
    pub fn len(&self) -> usize {
        self.raw.len() / ACCEL_SAMPLE_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<AccelSample> {
        let start = index.checked_mul(ACCEL_SAMPLE_LEN)?;
        let bytes = self.raw.get(start..start + ACCEL_SAMPLE_LEN)?;
        let mut sample = [0i16; 3];
        LittleEndian::read_i16_into(bytes, &mut sample);
        Some(sample)
    }

    pub fn iter(&self) -> impl Iterator<Item = AccelSample> + 'a {
        self.raw.chunks_exact(ACCEL_SAMPLE_LEN).map(|bytes| {
            let mut sample = [0i16; 3];
            LittleEndian::read_i16_into(bytes, &mut sample);
            sample
        })
    }

    /// The encoded samples, `6 * len()` bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }
}

/// One decoded container block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    GyroSetup {
        revision: u8,
        samples_per_block: u16,
    },
    Time {
        elapsed_us: u32,
    },
    /// The first `samples` entries of the caller's gyro buffer hold the
    /// reconstructed orientations.
    GyroData {
        samples: usize,
        profile: PrecisionProfile,
    },
    AccelSetup {
        range: u8,
    },
    AccelData(AccelData<'a>),
}

/// Sequential block reader.
///
/// Gyro data blocks carry no length; they are decoded in place with the
/// reader's own predictor state to find where they end. After the first
/// error the reader yields nothing more.
pub struct LogReader<'a> {
    input: &'a [u8],
    pos: usize,
    state: PredictorState,
}

impl<'a> LogReader<'a> {
    /// Validates the header and positions the reader at the first block.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        read_header(input)?;
        Ok(Self {
            input,
            pos: MAGIC.len(),
            state: PredictorState::new(),
        })
    }

    /// Byte offset of the next block.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decoder state after the last gyro block.
    pub fn state(&self) -> &PredictorState {
        &self.state
    }

    /// Reads the next block, decoding gyro data into `gyro_out`.
    pub fn next_block(&mut self, gyro_out: &mut [FixedQuat]) -> Option<Result<Block<'a>>> {
        if self.pos >= self.input.len() {
            return None;
        }
        let result = self.read_block(gyro_out);
        if result.is_err() {
            self.pos = self.input.len();
        }
        Some(result)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let input: &'a [u8] = self.input;
        let bytes = input
            .get(self.pos..self.pos + len)
            .ok_or(Error::TruncatedPayload)?;
        self.pos += len;
        Ok(bytes)
    }

    fn read_block(&mut self, gyro_out: &mut [FixedQuat]) -> Result<Block<'a>> {
        let tag = BlockTag::try_from(self.input[self.pos])?;
        match tag {
            BlockTag::GyroSetup => {
                let bytes = self.take(GYRO_SETUP_LEN)?;
                Ok(Block::GyroSetup {
                    revision: bytes[1],
                    samples_per_block: LittleEndian::read_u16(&bytes[2..4]),
                })
            }
            BlockTag::Time => {
                let bytes = self.take(TIME_LEN)?;
                Ok(Block::Time {
                    elapsed_us: LittleEndian::read_u32(&bytes[1..5]),
                })
            }
            BlockTag::GyroData => {
                let payload = &self.input[self.pos + 1..];
                let block = decompress_block(&self.state, payload, gyro_out)?;
                self.state = block.state;
                self.pos += 1 + block.bytes_read;
                Ok(Block::GyroData {
                    samples: block.samples,
                    profile: block.profile,
                })
            }
            BlockTag::AccelSetup => {
                let bytes = self.take(ACCEL_SETUP_LEN)?;
                Ok(Block::AccelSetup { range: bytes[1] })
            }
            BlockTag::AccelData => {
                let header = self.take(ACCEL_HEADER_LEN)?;
                let raw = self.take(header[1] as usize * ACCEL_SAMPLE_LEN)?;
                Ok(Block::AccelData(AccelData { raw }))
            }
        }
    }
}
