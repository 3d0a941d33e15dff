//! Generates the Laplace cumulative-frequency tables used by
//! `encoding::laplace`.
//!
//! Bucket `i` models a zero-mean Laplace distribution with variance
//! `2^(i - 6)`, i.e. scale `b = sqrt(var / 2)`. Symbol `x` takes the mass of
//! `[x - 0.5, x + 0.5)`; the tails beyond the alphabet are folded into the
//! edge symbols. Every symbol keeps a frequency of at least one.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const NUM_BUCKETS: usize = 16;
const SYMBOL_MIN: i32 = -128;
const SYMBOL_MAX: i32 = 127;
const NUM_SYMBOLS: usize = 256;
const TOTAL: u32 = 1 << 15;

fn laplace_cdf(t: f64, b: f64) -> f64 {
    if t < 0.0 {
        0.5 * (t / b).exp()
    } else {
        1.0 - 0.5 * (-t / b).exp()
    }
}

fn build_table(bucket: usize) -> [u32; NUM_SYMBOLS + 1] {
    let variance = 2f64.powi(bucket as i32 - 6);
    let b = (variance / 2.0).sqrt();
    let spare = (TOTAL - NUM_SYMBOLS as u32) as f64;

    let mut freqs = [0u32; NUM_SYMBOLS];
    for (k, freq) in freqs.iter_mut().enumerate() {
        let x = SYMBOL_MIN + k as i32;
        let lo = if x == SYMBOL_MIN {
            0.0
        } else {
            laplace_cdf(x as f64 - 0.5, b)
        };
        let hi = if x == SYMBOL_MAX {
            1.0
        } else {
            laplace_cdf(x as f64 + 0.5, b)
        };
        let p = (hi - lo).max(0.0);
        *freq = 1 + (p * spare).floor() as u32;
    }

    let sum: u32 = freqs.iter().sum();
    assert!(sum <= TOTAL, "bucket {bucket}: frequencies overshoot ({sum})");
    freqs[(-SYMBOL_MIN) as usize] += TOTAL - sum;

    let mut cdf = [0u32; NUM_SYMBOLS + 1];
    for k in 0..NUM_SYMBOLS {
        cdf[k + 1] = cdf[k] + freqs[k];
    }

    assert_eq!(cdf[0], 0, "bucket {bucket}: cdf must start at zero");
    assert_eq!(cdf[NUM_SYMBOLS], TOTAL, "bucket {bucket}: cdf must end at {TOTAL}");
    assert!(
        cdf.windows(2).all(|w| w[1] > w[0]),
        "bucket {bucket}: every symbol needs a non-zero frequency"
    );
    cdf
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let mut src = String::new();
    src.push_str("// @generated by build.rs: discretized Laplace CDFs, one per variance bucket.\n");
    let _ = writeln!(
        src,
        "pub(crate) static CDF_TABLES: [[u16; {}]; {}] = [",
        NUM_SYMBOLS + 1,
        NUM_BUCKETS
    );
    for bucket in 0..NUM_BUCKETS {
        let table = build_table(bucket);
        src.push_str("    [");
        for (k, value) in table.iter().enumerate() {
            if k > 0 {
                src.push_str(", ");
            }
            let _ = write!(src, "{value}");
        }
        src.push_str("],\n");
    }
    src.push_str("];\n");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest = Path::new(&out_dir).join("laplace_tables.rs");
    fs::write(dest, src).expect("failed to write laplace_tables.rs");
}
