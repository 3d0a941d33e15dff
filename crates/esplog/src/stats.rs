use serde::{Deserialize, Serialize};

/// Bytes of one uncompressed orientation sample (4 x i32).
pub const RAW_SAMPLE_BYTES: u64 = 16;

/// Counters kept by a [`LogWriter`](crate::writer::LogWriter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    pub gyro_samples: u64,
    pub gyro_blocks: u64,
    pub keyframes: u64,
    /// Blocks that needed a profile other than the first one.
    pub fallback_blocks: u64,
    pub dropped_blocks: u64,
    pub dropped_samples: u64,
    /// Gyro data block bytes, tag included.
    pub gyro_bytes: u64,
    pub accel_samples: u64,
    pub accel_blocks: u64,
    /// Everything written to the sink, header included.
    pub total_bytes: u64,
}

impl WriterStats {
    pub fn record_gyro_block(&mut self, samples: usize, bytes: usize, keyframe: bool, fallback: bool) {
        self.gyro_samples += samples as u64;
        self.gyro_blocks += 1;
        self.gyro_bytes += bytes as u64;
        if keyframe {
            self.keyframes += 1;
        }
        if fallback {
            self.fallback_blocks += 1;
        }
    }

    pub fn record_dropped(&mut self, samples: usize) {
        self.dropped_blocks += 1;
        self.dropped_samples += samples as u64;
    }

    pub fn record_accel_block(&mut self, samples: usize) {
        self.accel_blocks += 1;
        self.accel_samples += samples as u64;
    }

    /// Size of the stored gyro samples without compression.
    pub fn raw_gyro_bytes(&self) -> u64 {
        self.gyro_samples * RAW_SAMPLE_BYTES
    }

    /// Compressed gyro bytes per raw gyro byte.
    pub fn gyro_ratio(&self) -> f64 {
        if self.gyro_samples == 0 {
            return 0.0;
        }
        self.gyro_bytes as f64 / self.raw_gyro_bytes() as f64
    }

    pub fn bytes_saved(&self) -> u64 {
        self.raw_gyro_bytes().saturating_sub(self.gyro_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_and_savings() {
        let mut stats = WriterStats::default();
        assert_eq!(stats.gyro_ratio(), 0.0);
        stats.record_gyro_block(100, 400, true, false);
        stats.record_gyro_block(100, 400, false, true);
        stats.record_dropped(100);
        assert_eq!(stats.raw_gyro_bytes(), 3200);
        assert_eq!(stats.gyro_ratio(), 0.25);
        assert_eq!(stats.bytes_saved(), 2400);
        assert_eq!(stats.keyframes, 1);
        assert_eq!(stats.fallback_blocks, 1);
        assert_eq!(stats.dropped_samples, 100);
    }
}
