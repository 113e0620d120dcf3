//! Driver for Microstrain 3DM-GX4 inertial sensors speaking the MIP protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transport abstraction and the serial backend (`serial` feature)
//! - [`frame`]: frame codec, stream reassembler and MIP field helpers
//! - [`session`]: command/response session, telemetry decoding, baud negotiation
//! - [`device`]: typed device commands
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> gx4::session::Result<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use gx4::session::{ImuData, ImuFields};
//! use gx4::Device;
//!
//! let mut imu = Device::open("/dev/ttyACM0", 115_200)?;
//! imu.idle()?;
//! imu.set_imu_data_rate(10, ImuFields::ACCELEROMETER | ImuFields::GYROSCOPE)?;
//!
//! let observer = Arc::new(|data: &ImuData| println!("{:?}", data.accel()));
//! imu.set_imu_observer(&observer);
//! imu.enable_imu_stream(true)?;
//! imu.resume()?;
//! loop {
//!     imu.run_once(Duration::from_millis(100))?;
//! }
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use gx4_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gx4_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use gx4_session::*;
}

/// Re-export device types.
pub mod device {
    pub use gx4_device::*;
}

pub use gx4_device::{Device, DeviceInfo, DiagnosticFields};
