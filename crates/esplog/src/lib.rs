//! Host-side EspLog tooling: a streaming writer over [`std::io::Write`], a
//! whole-log decoder, TOML recorder configuration and synthetic motion.

pub mod config;
pub mod error;
pub mod motion;
pub mod reader;
pub mod stats;
pub mod writer;

pub use config::{MotionConfig, RecorderArgs, RecorderConfig};
pub use error::{LogError, Result};
pub use reader::{decode_log, DecodedLog, GyroBlockInfo};
pub use stats::WriterStats;
pub use writer::LogWriter;
