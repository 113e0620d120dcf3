//! Byte transport abstraction for serial-attached MIP devices.
//!
//! This is the lowest layer of gx4. The protocol engine never touches a
//! serial port directly; it only sees a [`ByteTransport`]:
//! - `read` with a timeout (byte source)
//! - `write` with a timeout (byte sink)
//! - `reconfigure` to a new baud rate
//!
//! A `serialport` backed implementation is available behind the `serial`
//! feature.

pub mod error;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::ByteTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
