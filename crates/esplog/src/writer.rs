//! Streaming EspLog writer.

use std::io::Write;

use esplog_core::container::{
    write_accel_data, write_accel_setup, write_gyro_data, write_gyro_setup, write_header,
    write_time_block, AccelSample, MAX_ACCEL_SAMPLES,
};
use esplog_core::predictors::CHANNELS;
use esplog_core::{max_payload_len, FixedQuat, PrecisionProfile, PredictorState};
use tracing::{debug, warn};

use crate::config::RecorderConfig;
use crate::error::Result;
use crate::stats::WriterStats;

/// Buffers gyro and accel samples and writes them as container blocks.
///
/// Every gyro block is preceded by a time block carrying the elapsed time of
/// its first sample. A batch that no profile can encode is dropped and the
/// predictor restarts, so the next block opens with a keyframe.
pub struct LogWriter<W: Write> {
    sink: W,
    samples_per_block: usize,
    profiles: Vec<PrecisionProfile>,
    state: PredictorState,
    gyro: Vec<FixedQuat>,
    gyro_started_us: u32,
    accel: Vec<AccelSample>,
    block: Vec<u8>,
    scratch: Vec<i8>,
    stats: WriterStats,
}

impl<W: Write> LogWriter<W> {
    /// Writes the header and setup blocks.
    pub fn new(mut sink: W, config: &RecorderConfig) -> Result<Self> {
        config.validate()?;
        let samples_per_block = config.samples_per_block as usize;

        let mut preamble = [0u8; 16];
        let mut len = write_header(&mut preamble)?;
        len += write_gyro_setup(&mut preamble[len..], config.samples_per_block)?;
        len += write_accel_setup(&mut preamble[len..], config.accel_range)?;
        sink.write_all(&preamble[..len])?;

        let block_len = (1 + max_payload_len(samples_per_block))
            .max(2 + 6 * MAX_ACCEL_SAMPLES);

        Ok(Self {
            sink,
            samples_per_block,
            profiles: config.profiles.clone(),
            state: PredictorState::new(),
            gyro: Vec::with_capacity(samples_per_block),
            gyro_started_us: 0,
            accel: Vec::with_capacity(MAX_ACCEL_SAMPLES),
            block: vec![0u8; block_len],
            scratch: vec![0i8; CHANNELS * samples_per_block],
            stats: WriterStats {
                total_bytes: len as u64,
                ..WriterStats::default()
            },
        })
    }

    /// Queues one orientation taken `elapsed_us` after the start of the log.
    pub fn push_gyro(&mut self, sample: FixedQuat, elapsed_us: u32) -> Result<()> {
        if self.gyro.is_empty() {
            self.gyro_started_us = elapsed_us;
        }
        self.gyro.push(sample);
        if self.gyro.len() == self.samples_per_block {
            self.flush_gyro()?;
        }
        Ok(())
    }

    pub fn push_accel(&mut self, sample: AccelSample) -> Result<()> {
        self.accel.push(sample);
        if self.accel.len() == MAX_ACCEL_SAMPLES {
            self.flush_accel()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Writes pending accel samples, then the pending gyro batch.
    pub fn flush_gyro(&mut self) -> Result<()> {
        self.flush_accel()?;
        if self.gyro.is_empty() {
            return Ok(());
        }

        let keyframe = !self.state.is_primed();
        let n = self.gyro.len();
        match write_gyro_data(
            &mut self.state,
            &self.gyro,
            &self.profiles,
            &mut self.block,
            &mut self.scratch,
        ) {
            Ok(block) => {
                let mut time = [0u8; 5];
                let time_len = write_time_block(&mut time, self.gyro_started_us)?;
                self.sink.write_all(&time[..time_len])?;
                self.sink.write_all(&self.block[..block.bytes_written])?;

                let fallback = self.profiles.first() != Some(&block.profile);
                self.stats
                    .record_gyro_block(n, block.bytes_written, keyframe, fallback);
                self.stats.total_bytes += (time_len + block.bytes_written) as u64;
                debug!(
                    samples = n,
                    bytes = block.bytes_written,
                    shift = block.profile.shift(),
                    keyframe,
                    "gyro block written"
                );
            }
            Err(e) => {
                warn!(
                    samples = n,
                    elapsed_us = self.gyro_started_us,
                    error = %e,
                    "dropping gyro block"
                );
                self.stats.record_dropped(n);
                self.state = PredictorState::new();
            }
        }
        self.gyro.clear();
        Ok(())
    }

    fn flush_accel(&mut self) -> Result<()> {
        if self.accel.is_empty() {
            return Ok(());
        }
        let len = write_accel_data(&mut self.block, &self.accel)?;
        self.sink.write_all(&self.block[..len])?;
        self.stats.record_accel_block(self.accel.len());
        self.stats.total_bytes += len as u64;
        self.accel.clear();
        Ok(())
    }

    /// Flushes everything pending and returns the sink with the final counters.
    pub fn finish(mut self) -> Result<(W, WriterStats)> {
        self.flush_gyro()?;
        self.sink.flush()?;
        Ok((self.sink, self.stats))
    }
}
