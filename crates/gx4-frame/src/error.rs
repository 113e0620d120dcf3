/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds what the one-byte length field can describe.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame does not start with the sync marker.
    #[error("invalid sync marker (expected 0x75 0x65)")]
    InvalidSync,

    /// The length byte disagrees with the number of bytes supplied.
    #[error("length mismatch (header declares {declared} payload bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The trailing checksum does not match the computed one.
    #[error("checksum mismatch (computed {expected:#06x}, frame carries {actual:#06x})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Not enough bytes for the structure being decoded.
    #[error("truncated input (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
