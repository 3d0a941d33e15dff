use crate::compression::block::PrecisionProfile;
use crate::encoding::laplace::{bucket_from_fixed, VarianceIndex, SYMBOL_MAX, SYMBOL_MIN};
use crate::quat::{FixedQuat, RotationVector};
use fixed::types::I2F30;

/// Residual channels per sample: the three tangent-space components of the
/// prediction error.
pub const CHANNELS: usize = 3;

/// One quantized prediction error per channel.
pub type Residual = [i8; CHANNELS];

// --- Variance estimator (Q8 fixed point) ---
// Running mean of |residual| with 8 fractional bits, smoothing factor 1/8.
const MAGNITUDE_FRAC_BITS: u32 = 8;
const SMOOTHING_SHIFT: u32 = 3;
/// Initial magnitude: the stream starts in the lowest variance bucket.
const DEFAULT_MAGNITUDE: u32 = 0;

// --- Rate tracking ---
// Residuals of magnitude <= RATE_DEADZONE are quantization noise and leave the
// rate alone; larger corrections are folded in with gain 1/2^RATE_GAIN_SHIFT.
const RATE_DEADZONE: u8 = 1;
const RATE_GAIN_SHIFT: u32 = 3;

/// Causal per-stream predictor state.
///
/// Holds the last reconstructed orientation, a per-sample rotation estimate
/// (used as a constant-rate extrapolation) and one variance estimator per
/// residual channel. Everything here is derived from
/// reconstructed values only, so the decoder tracks it bit for bit.
///
/// The state is `Copy`; transitions return new values, and the block
/// compressor hands a new state back only when a whole batch succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PredictorState {
    last: FixedQuat,
    rate: FixedQuat,
    magnitude: [u32; CHANNELS],
    primed: bool,
}

impl Default for PredictorState {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorState {
    /// Fresh stream: identity orientation, no motion, lowest variance, and
    /// no reference orientation yet.
    pub fn new() -> Self {
        Self {
            last: FixedQuat::IDENTITY,
            rate: FixedQuat::IDENTITY,
            magnitude: [DEFAULT_MAGNITUDE; CHANNELS],
            primed: false,
        }
    }

    /// State established by a keyframe: known orientation and rate, default
    /// variance estimators.
    pub fn primed(orientation: FixedQuat, rate: FixedQuat) -> Self {
        Self {
            last: orientation,
            rate,
            magnitude: [DEFAULT_MAGNITUDE; CHANNELS],
            primed: true,
        }
    }

    /// False until a keyframe has been committed.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Last reconstructed orientation.
    pub fn last(&self) -> FixedQuat {
        self.last
    }

    /// Current per-sample rotation estimate.
    pub fn rate(&self) -> FixedQuat {
        self.rate
    }

    /// Expected next orientation: the last one advanced by the last rate.
    pub fn predict(&self) -> FixedQuat {
        (self.last * self.rate).normalized()
    }

    /// Quantizes the rotation from `predicted` to `actual` at `profile`.
    ///
    /// Returns the index of the first channel that does not fit
    /// `-128..=127` on overflow.
    pub fn quantize(
        actual: &FixedQuat,
        predicted: &FixedQuat,
        profile: PrecisionProfile,
    ) -> Result<Residual, usize> {
        let error = predicted.delta_to(*actual).to_rotation_vector();
        let shift = profile.shift() as u32;
        let half = 1i64 << (shift - 1);

        let mut residual = [0i8; CHANNELS];
        for (channel, component) in error.to_array().iter().enumerate() {
            let symbol = (component.to_bits() as i64 + half) >> shift;
            if symbol < SYMBOL_MIN as i64 || symbol > SYMBOL_MAX as i64 {
                return Err(channel);
            }
            residual[channel] = symbol as i8;
        }
        Ok(residual)
    }

    /// Orientation the decoder will see for `residual`: `predicted` advanced
    /// by the dequantized rotation vector.
    pub fn reconstruct(
        predicted: &FixedQuat,
        residual: &Residual,
        profile: PrecisionProfile,
    ) -> FixedQuat {
        let shift = profile.shift() as u32;
        let dequantize = |r: i8| I2F30::from_bits((r as i32) << shift);
        let correction = RotationVector::new(
            dequantize(residual[0]),
            dequantize(residual[1]),
            dequantize(residual[2]),
        );
        (*predicted * FixedQuat::from_rotation_vector(correction)).normalized()
    }

    /// Variance bucket of one channel for the next symbol.
    pub fn bucket(&self, channel: usize) -> VarianceIndex {
        // Laplace: variance = 2 * E|x|^2
        let m = self.magnitude[channel] as u64;
        bucket_from_fixed(2 * m * m, 2 * MAGNITUDE_FRAC_BITS)
    }

    /// Variance buckets of all channels for the next sample.
    pub fn classify(&self) -> [VarianceIndex; CHANNELS] {
        [self.bucket(0), self.bucket(1), self.bucket(2)]
    }

    /// Folds a committed residual into the variance estimators.
    pub fn observe(&mut self, residual: &Residual) {
        for (m, &r) in self.magnitude.iter_mut().zip(residual.iter()) {
            let target = (r as i32).unsigned_abs() << MAGNITUDE_FRAC_BITS;
            let current = *m as i32;
            *m = (current + ((target as i32 - current) >> SMOOTHING_SHIFT)) as u32;
        }
    }

    /// Moves the reference to a new reconstructed orientation.
    ///
    /// The rate only moves when `residual` leaves the dead zone, and then by
    /// a fraction of the applied correction.
    pub fn advance(&mut self, reconstructed: FixedQuat, residual: &Residual) {
        if residual.iter().any(|r| r.unsigned_abs() > RATE_DEADZONE) {
            let correction = self.predict().delta_to(reconstructed).to_rotation_vector();
            let damped = RotationVector::new(
                correction.x >> RATE_GAIN_SHIFT,
                correction.y >> RATE_GAIN_SHIFT,
                correction.z >> RATE_GAIN_SHIFT,
            );
            self.rate = (self.rate * FixedQuat::from_rotation_vector(damped))
                .canonical()
                .normalized();
        }
        self.last = reconstructed;
    }

    /// Full transition for one sample: orientation and estimators.
    pub fn commit(&self, reconstructed: FixedQuat, residual: &Residual) -> Self {
        let mut next = *self;
        next.advance(reconstructed, residual);
        next.observe(residual);
        next
    }
}
