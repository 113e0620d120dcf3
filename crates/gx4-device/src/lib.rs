//! Device facade for 3DM-GX4 inertial sensors.
//!
//! [`Device`] wraps a [`Session`](gx4_session::Session) and exposes the
//! device's commands as typed methods. Every method blocks until the
//! device acknowledges or the session's command timeout elapses.

pub mod command;
pub mod device;
pub mod info;

pub use device::Device;
pub use info::{DeviceInfo, DiagnosticFields};
