//! Error type for the host-side log tooling.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    /// Reading or writing the underlying file or stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The codec or container rejected a block.
    #[error("codec error: {0}")]
    Codec(#[from] esplog_core::Error),

    #[error("could not parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Elapsed time of a sample no longer fits the u32 microsecond clock.
    #[error("sample {sample} is past the u32 microsecond clock")]
    ClockOverflow { sample: u32 },

    /// A config value that parses but cannot be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
