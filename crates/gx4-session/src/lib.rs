//! Protocol engine for serial-attached MIP inertial sensors.
//!
//! A [`Session`] owns the byte transport and the stream reassembler. It
//! sends one command at a time and waits for the matching ACK/NACK, while
//! telemetry frames arriving on the same line are decoded and handed to
//! the registered observers.

pub mod baud;
pub mod error;
pub mod observer;
pub mod session;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use baud::{
    discover_baud_rate, select_baud_rate, select_baud_rate_with_config, BaudConfig, BaudSelection,
    SUPPORTED_BAUD_RATES,
};
pub use error::{Result, SessionError};
pub use observer::{FilterObserver, ImuObserver};
pub use session::{Session, SessionConfig, SessionStats};
pub use telemetry::{
    decode_filter, decode_imu, Estimate, FilterData, FilterFields, GpsTime, ImuData, ImuFields,
    TelemetryError, TelemetryLayout,
};
