//! Whole-log decoding for inspection and verification.

use esplog_core::compression::block::MAX_BATCH;
use esplog_core::container::{AccelSample, Block, LogReader};
use esplog_core::FixedQuat;
use serde::{Serialize, Serializer};
use std::io::{self, Write};
use tracing::debug;

use crate::error::Result;

/// One decoded gyro data block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GyroBlockInfo {
    /// Value of the time block preceding it, if any.
    pub elapsed_us: Option<u32>,
    pub samples: usize,
    /// Quantization shift the block was coded with.
    pub shift: u8,
    /// Index of its first sample in [`DecodedLog::orientations`].
    pub first_sample: usize,
}

/// Everything recovered from an EspLog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedLog {
    pub gyro_revision: Option<u8>,
    pub samples_per_block: Option<u16>,
    pub accel_range: Option<u8>,
    pub gyro_blocks: Vec<GyroBlockInfo>,
    #[serde(serialize_with = "orientations_as_f64")]
    pub orientations: Vec<FixedQuat>,
    pub accel: Vec<AccelSample>,
}

fn orientations_as_f64<S: Serializer>(
    orientations: &[FixedQuat],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(orientations.iter().map(|q| q.to_f64()))
}

impl DecodedLog {
    /// Human-readable summary, one field per line, then one line per gyro block.
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(n) = self.samples_per_block {
            writeln!(out, "samples per block: {n}")?;
        }
        if let Some(range) = self.accel_range {
            writeln!(out, "accel range:       {range} g")?;
        }
        writeln!(out, "gyro blocks:       {}", self.gyro_blocks.len())?;
        writeln!(out, "orientations:      {}", self.orientations.len())?;
        writeln!(out, "accel samples:     {}", self.accel.len())?;
        for block in &self.gyro_blocks {
            let elapsed = block
                .elapsed_us
                .map_or_else(|| "-".to_string(), |t| t.to_string());
            writeln!(
                out,
                "  t={elapsed:>10} us  samples={:>5}  shift={:>2}",
                block.samples, block.shift
            )?;
        }
        if let Some(last) = self.orientations.last() {
            let [w, x, y, z] = last.to_f64();
            writeln!(out, "last orientation:  w={w:.6} x={x:.6} y={y:.6} z={z:.6}")?;
        }
        Ok(())
    }
}

/// Decodes every block of `bytes`.
pub fn decode_log(bytes: &[u8]) -> Result<DecodedLog> {
    let mut reader = LogReader::new(bytes)?;
    let mut gyro = vec![FixedQuat::IDENTITY; MAX_BATCH];
    let mut log = DecodedLog::default();
    let mut pending_time = None;

    while let Some(block) = reader.next_block(&mut gyro) {
        match block? {
            Block::GyroSetup {
                revision,
                samples_per_block,
            } => {
                log.gyro_revision = Some(revision);
                log.samples_per_block = Some(samples_per_block);
            }
            Block::Time { elapsed_us } => pending_time = Some(elapsed_us),
            Block::GyroData { samples, profile } => {
                log.gyro_blocks.push(GyroBlockInfo {
                    elapsed_us: pending_time.take(),
                    samples,
                    shift: profile.shift(),
                    first_sample: log.orientations.len(),
                });
                log.orientations.extend_from_slice(&gyro[..samples]);
            }
            Block::AccelSetup { range } => log.accel_range = Some(range),
            Block::AccelData(data) => log.accel.extend(data.iter()),
        }
    }

    debug!(
        gyro_blocks = log.gyro_blocks.len(),
        orientations = log.orientations.len(),
        accel = log.accel.len(),
        "log decoded"
    );
    Ok(log)
}
