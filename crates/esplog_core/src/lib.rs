//! Orientation telemetry codec for on-device logging.
//!
//! Fixed-point quaternion samples are predicted from the previous
//! reconstruction, the tangent-space prediction error is quantized to small
//! symbols, and the symbols are range coded against one of sixteen
//! precomputed Laplace tables selected by a running variance estimate.
//!
//! The crate is `no_std` and never allocates: every buffer is supplied by
//! the caller, and predictor state is a `Copy` value that only changes when a
//! block has been encoded completely.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod compression;
pub mod container;
pub mod encoding;
pub mod error;
pub mod predictors;
pub mod quat;

pub use compression::block::{
    compress_block, compress_with_fallback, decompress_block, max_payload_len, CompressedBlock,
    DecompressedBlock, PrecisionProfile,
};
pub use error::{Error, Result};
pub use predictors::PredictorState;
pub use quat::{FixedQuat, RotationVector};
