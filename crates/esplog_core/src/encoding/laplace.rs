//! Variance-classified Laplace probability model.
//!
//! Sixteen static cumulative-frequency tables, one per [`VarianceIndex`],
//! each describing a discretized zero-mean Laplace distribution over the
//! symbol alphabet `-128..=127` scaled to a total mass of `2^15`. The tables
//! are generated by `build.rs` and never change at runtime, so the hot
//! encode/decode path is integer-only.

include!(concat!(env!("OUT_DIR"), "/laplace_tables.rs"));

/// log2 of the total frequency mass of every table.
pub const SCALE_BITS: u32 = 15;
/// Total frequency mass of every table.
pub const TOTAL_FREQ: u32 = 1 << SCALE_BITS;
/// Number of variance buckets.
pub const NUM_BUCKETS: usize = 16;
/// Smallest representable residual symbol.
pub const SYMBOL_MIN: i32 = -128;
/// Largest representable residual symbol.
pub const SYMBOL_MAX: i32 = 127;

const MIN_VARIANCE: f64 = 0.001;
const MAX_VARIANCE: f64 = 1024.0;
/// Bucket `i` represents variance `2^(i - BUCKET_OFFSET)`.
const BUCKET_OFFSET: i32 = 6;

/// A discrete bucket of local signal variance, in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarianceIndex(u8);

impl VarianceIndex {
    pub const MIN: VarianceIndex = VarianceIndex(0);
    pub const MAX: VarianceIndex = VarianceIndex(NUM_BUCKETS as u8 - 1);

    /// Returns `None` for indices past the last bucket.
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < NUM_BUCKETS {
            Some(VarianceIndex(index))
        } else {
            None
        }
    }

    /// Clamps any integer into the bucket range.
    pub fn saturating(index: i32) -> Self {
        VarianceIndex(index.clamp(0, NUM_BUCKETS as i32 - 1) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Iterates over all sixteen buckets in increasing variance order.
    pub fn all() -> impl Iterator<Item = VarianceIndex> {
        (0..NUM_BUCKETS as u8).map(VarianceIndex)
    }

    fn table(self) -> &'static [u16; 257] {
        &CDF_TABLES[self.0 as usize]
    }
}

/// Scaled cumulative probability of all symbols strictly below `x`.
pub fn cdf(x: i32, bucket: VarianceIndex) -> u32 {
    if x <= SYMBOL_MIN {
        0
    } else if x > SYMBOL_MAX {
        TOTAL_FREQ
    } else {
        bucket.table()[(x - SYMBOL_MIN) as usize] as u32
    }
}

/// Scaled probability mass of symbol `x`.
pub fn freq(x: i32, bucket: VarianceIndex) -> u32 {
    cdf(x + 1, bucket) - cdf(x, bucket)
}

/// `(cumulative frequency, frequency)` pair fed to the range coder.
pub fn symbol_range(x: i32, bucket: VarianceIndex) -> (u32, u32) {
    let start = cdf(x, bucket);
    (start, cdf(x + 1, bucket) - start)
}

/// Inverse of [`cdf`]: the symbol `x` with `cdf(x) <= y < cdf(x + 1)`.
///
/// `y` must be below [`TOTAL_FREQ`]; larger values resolve to the last
/// symbol.
pub fn icdf(y: u32, bucket: VarianceIndex) -> i32 {
    // Invariant: cdf(lo) <= y < cdf(hi)
    let mut lo = SYMBOL_MIN;
    let mut hi = SYMBOL_MAX + 1;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if cdf(mid, bucket) <= y {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Maps a continuous variance estimate to its bucket.
///
/// `clamp(floor(log2(clamp(variance, 0.001, 1024))) + 6, 0, 15)`. NaN is
/// treated as the minimum variance.
pub fn variance_to_bucket(variance: f64) -> VarianceIndex {
    let clamped = if variance.is_nan() {
        MIN_VARIANCE
    } else {
        variance.clamp(MIN_VARIANCE, MAX_VARIANCE)
    };
    let exponent = libm::floor(libm::log2(clamped)) as i32;
    VarianceIndex::saturating(exponent + BUCKET_OFFSET)
}

/// Integer-only [`variance_to_bucket`] for a fixed-point variance
/// `bits / 2^frac_bits`. Agrees with the floating-point version for every
/// representable value.
pub fn bucket_from_fixed(bits: u64, frac_bits: u32) -> VarianceIndex {
    if bits == 0 {
        return VarianceIndex::MIN;
    }
    let exponent = 63 - bits.leading_zeros() as i32 - frac_bits as i32;
    VarianceIndex::saturating(exponent + BUCKET_OFFSET)
}

/// Canonical variance of a bucket, `2^(clamp(bucket, 0, 15) - 6)`.
pub fn bucket_to_variance(bucket: i32) -> f64 {
    let exponent = bucket.clamp(0, NUM_BUCKETS as i32 - 1) - BUCKET_OFFSET;
    if exponent >= 0 {
        (1u32 << exponent) as f64
    } else {
        1.0 / (1u32 << -exponent) as f64
    }
}

/// log2 of the total frequency mass.
pub const fn scale_bits() -> u32 {
    SCALE_BITS
}
