//! Telemetry observers.
//!
//! The session keeps only [`Weak`](std::sync::Weak) handles to observers:
//! the caller owns them and decides how long they stay registered. An
//! observer that has been dropped is unregistered on the next
//! record.
//!
//! Observers run inline on the thread driving the session and must not
//! block.

use crate::telemetry::{FilterData, ImuData};

/// Receives decoded IMU records.
pub trait ImuObserver {
    fn on_imu_data(&self, data: &ImuData);
}

/// Receives decoded estimation filter records.
pub trait FilterObserver {
    fn on_filter_data(&self, data: &FilterData);
}

impl<F: Fn(&ImuData)> ImuObserver for F {
    fn on_imu_data(&self, data: &ImuData) {
        self(data)
    }
}

impl<F: Fn(&FilterData)> FilterObserver for F {
    fn on_filter_data(&self, data: &FilterData) {
        self(data)
    }
}
