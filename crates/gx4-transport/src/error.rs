use std::time::Duration;

/// Direction of a transport operation, used in timeout reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur in byte transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying device.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No bytes could be moved before the timeout elapsed.
    #[error("{direction} timed out after {timeout:?}")]
    Timeout {
        direction: Direction,
        timeout: Duration,
    },

    /// The device reported end-of-stream.
    #[error("transport closed")]
    Closed,

    /// The serial backend rejected an operation.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl TransportError {
    /// True if this error only reports that the deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
