//! Synthetic sensor data for recording demos and tests.

use std::io::Write;

use esplog_core::container::AccelSample;
use esplog_core::{FixedQuat, RotationVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{MotionConfig, RecorderConfig};
use crate::error::{LogError, Result};
use crate::stats::WriterStats;
use crate::writer::LogWriter;

/// Orientation stream rotating by a constant step plus optional uniform
/// jitter. Starts at the identity; deterministic for a given seed.
pub struct MotionGenerator {
    orientation: FixedQuat,
    step: [f64; 3],
    jitter: f64,
    accel_noise: f64,
    rng: ChaCha8Rng,
}

impl MotionGenerator {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            orientation: FixedQuat::IDENTITY,
            step: config.step,
            jitter: config.jitter,
            accel_noise: config.accel_noise,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    /// Orientation the next gyro sample will report.
    pub fn orientation(&self) -> FixedQuat {
        self.orientation
    }

    /// Gravity in the sensor frame for the current orientation, in raw
    /// counts of a `range_g` full-scale accelerometer.
    pub fn accel(&mut self, range_g: u8) -> AccelSample {
        let [w, x, y, z] = self.orientation.to_f64();
        // Third row of the rotation matrix: world z in body coordinates.
        let gravity = [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ];
        let counts_per_g = 32768.0 / range_g.max(1) as f64;
        let mut sample = [0i16; 3];
        for (out, g) in sample.iter_mut().zip(gravity) {
            let noise = if self.accel_noise > 0.0 && self.accel_noise.is_finite() {
                self.rng.gen_range(-self.accel_noise..=self.accel_noise)
            } else {
                0.0
            };
            *out = (g * counts_per_g + noise)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        sample
    }
}

impl Iterator for MotionGenerator {
    type Item = FixedQuat;

    fn next(&mut self) -> Option<FixedQuat> {
        let current = self.orientation;
        let mut step = self.step;
        if self.jitter > 0.0 && self.jitter.is_finite() {
            for axis in &mut step {
                *axis += self.rng.gen_range(-self.jitter..=self.jitter);
            }
        }
        let delta = FixedQuat::from_rotation_vector(RotationVector::from_f64(step[0], step[1], step[2]));
        self.orientation = (self.orientation * delta).normalized();
        Some(current)
    }
}

/// Records `samples` gyro readings of synthetic motion into `sink`, with one
/// accel reading every `config.accel_every` gyro samples.
pub fn record_synthetic<W: Write>(
    sink: W,
    config: &RecorderConfig,
    samples: u32,
) -> Result<(W, WriterStats)> {
    let mut writer = LogWriter::new(sink, config)?;
    let mut motion = MotionGenerator::new(&config.motion);

    for i in 0..samples {
        let elapsed_us = u32::try_from(u64::from(i) * 1_000_000 / u64::from(config.sample_rate_hz))
            .map_err(|_| LogError::ClockOverflow { sample: i })?;
        if i % config.accel_every == 0 {
            writer.push_accel(motion.accel(config.accel_range))?;
        }
        let Some(orientation) = motion.next() else {
            break;
        };
        writer.push_gyro(orientation, elapsed_us)?;
    }
    writer.finish()
}
