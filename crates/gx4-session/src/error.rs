use std::time::Duration;

use gx4_frame::FrameError;
use gx4_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed caller input (oversized payload, unsupported baud rate, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport-level failure. Not retried.
    #[error("transport error: {0}")]
    Io(#[from] TransportError),

    /// No matching reply arrived before the deadline.
    #[error("no reply to command set {descriptor:#04x} within {timeout:?}")]
    Timeout { descriptor: u8, timeout: Duration },

    /// The device answered with a NACK.
    #[error(
        "device rejected command {descriptor:#04x}/{} with error code {code:#04x}",
        field_label(.field)
    )]
    Command {
        descriptor: u8,
        field: Option<u8>,
        code: u8,
    },

    /// A command is already waiting for its reply.
    #[error("command set {descriptor:#04x} is still awaiting its reply")]
    AlreadyPending { descriptor: u8 },

    /// `wait_reply` was called with nothing outstanding.
    #[error("no command pending")]
    NotPending,

    /// Baud negotiation got no answer at any candidate rate.
    #[error("device unresponsive at baud rates {tried:?}")]
    DeviceUnresponsive { tried: Vec<u32> },

    /// The device acknowledged but the expected reply field is missing or short.
    #[error("reply to command set {descriptor:#04x} lacks a valid {field:#04x} field")]
    MalformedReply { descriptor: u8, field: u8 },
}

impl SessionError {
    /// True if the error only reports an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            SessionError::Timeout { .. } => true,
            SessionError::Io(err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        SessionError::InvalidArgument(err.to_string())
    }
}

fn field_label(field: &Option<u8>) -> String {
    match field {
        Some(field) => format!("{field:#04x}"),
        None => "-".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
