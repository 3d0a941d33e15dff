use core::fmt;

/// Errors produced by the codec and the log container.
///
/// Every variant is recoverable by the caller and none of them leaves the
/// caller's [`PredictorState`](crate::predictors::PredictorState) modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A residual does not fit the symbol range at the chosen precision.
    QuantizationOverflow { sample: usize, channel: usize },
    /// The encoded stream does not fit the destination buffer.
    OutputBufferExhausted,
    /// The batch needs more residual slots than the scratch buffer provides.
    ScratchBufferTooSmall { required: usize, available: usize },
    /// More samples than a block header can describe.
    BatchTooLarge(usize),
    /// Quantization shift outside the supported range.
    InvalidProfile(u8),
    /// An empty profile list was given to the fallback driver.
    NoProfiles,
    /// Payload or log ended before the structure it announced.
    TruncatedPayload,
    /// Payload header carries reserved bits or an unusable profile.
    InvalidPayload,
    /// A delta block arrived while the decoder had no reference orientation.
    MissingKeyframe,
    /// The caller's sample buffer cannot hold the decoded block.
    SampleBufferTooSmall { required: usize, available: usize },
    /// A fixed-size container block does not fit the destination buffer.
    BufferTooSmall { required: usize, available: usize },
    /// Accel blocks carry at most 255 samples.
    TooManyAccelSamples(usize),
    /// The log does not start with the `EspLog0` magic.
    BadMagic,
    /// A block tag outside 1..=5.
    UnknownBlock(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::QuantizationOverflow { sample, channel } => write!(
                f,
                "residual of sample {sample} channel {channel} overflows the symbol range"
            ),
            Error::OutputBufferExhausted => write!(f, "output buffer exhausted"),
            Error::ScratchBufferTooSmall {
                required,
                available,
            } => write!(
                f,
                "scratch buffer too small: need {required} slots, have {available}"
            ),
            Error::BatchTooLarge(n) => write!(f, "batch of {n} samples exceeds 65535"),
            Error::InvalidProfile(shift) => write!(f, "invalid precision profile shift {shift}"),
            Error::NoProfiles => write!(f, "no precision profiles given"),
            Error::TruncatedPayload => write!(f, "truncated payload"),
            Error::InvalidPayload => write!(f, "invalid payload header"),
            Error::MissingKeyframe => write!(f, "delta block without a preceding keyframe"),
            Error::SampleBufferTooSmall {
                required,
                available,
            } => write!(
                f,
                "sample buffer too small: need {required} samples, have {available}"
            ),
            Error::BufferTooSmall {
                required,
                available,
            } => write!(
                f,
                "buffer too small: need {required} bytes, have {available}"
            ),
            Error::TooManyAccelSamples(n) => {
                write!(f, "{n} accel samples exceed the 255-sample block limit")
            }
            Error::BadMagic => write!(f, "missing EspLog0 magic"),
            Error::UnknownBlock(tag) => write!(f, "unknown block tag {tag}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
