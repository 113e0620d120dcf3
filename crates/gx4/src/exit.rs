use std::fmt;
use std::io;

use gx4_session::SessionError;
use gx4_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const DEVICE_NACK: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Io(err) => transport_error(context, err),
        SessionError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::Timeout { .. } | SessionError::DeviceUnresponsive { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SessionError::Command { .. } => CliError::new(DEVICE_NACK, format!("{context}: {err}")),
        SessionError::MalformedReply { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gx4_transport::error::Direction;

    use super::*;

    #[test]
    fn nack_maps_to_device_nack() {
        let err = session_error(
            "ping failed",
            SessionError::Command {
                descriptor: 0x01,
                field: Some(0x01),
                code: 0x03,
            },
        );
        assert_eq!(err.code, DEVICE_NACK);
        assert!(err.message.starts_with("ping failed: "));
    }

    #[test]
    fn silent_device_maps_to_timeout() {
        let err = session_error(
            "baud",
            SessionError::DeviceUnresponsive {
                tried: vec![115_200],
            },
        );
        assert_eq!(err.code, TIMEOUT);

        let err = session_error(
            "read",
            SessionError::Io(TransportError::Timeout {
                direction: Direction::Read,
                timeout: Duration::from_millis(10),
            }),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn transport_io_keeps_permission_code() {
        let err = session_error(
            "open",
            SessionError::Io(TransportError::Io(io::Error::from(io::ErrorKind::PermissionDenied))),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn malformed_reply_is_data_invalid() {
        let err = session_error(
            "info",
            SessionError::MalformedReply {
                descriptor: 0x01,
                field: 0x81,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
