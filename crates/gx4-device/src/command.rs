//! Command payloads.
//!
//! Each function returns the payload of one command frame. The descriptor
//! set it is sent on is noted per function. Multi-byte values are
//! big-endian.

use bytes::{BufMut, Bytes};
use gx4_frame::descriptor::{base, device, filter, FUNCTION_APPLY};
use gx4_frame::PayloadBuilder;
use gx4_session::{FilterFields, ImuFields, Result, SessionError};

/// Model number the device status command expects.
pub const DIAGNOSTIC_MODEL_NUMBER: u16 = 6234;

/// Device status selector for the diagnostic report.
pub const DIAGNOSTIC_SELECTOR: u8 = 0x02;

/// GPS time update field identifiers.
pub const GPS_WEEK: u8 = 0x01;
pub const GPS_SECONDS: u8 = 0x02;

const PPS_DISABLED: u8 = 0x00;
const PPS_GPIO: u8 = 0x01;

fn single(field: u8, data: &[u8]) -> Result<Bytes> {
    Ok(PayloadBuilder::new().field(field, data)?.finish())
}

/// Base set: ping.
pub fn ping() -> Result<Bytes> {
    single(base::PING, &[])
}

/// Base set: stop streaming and wait for commands.
pub fn idle() -> Result<Bytes> {
    single(base::IDLE, &[])
}

/// Base set: return to the mode before idle.
pub fn resume() -> Result<Bytes> {
    single(base::RESUME, &[])
}

/// Base set: device information query.
pub fn device_info() -> Result<Bytes> {
    single(base::DEVICE_INFO, &[])
}

/// 3DM set: IMU data base rate query.
pub fn imu_base_rate() -> Result<Bytes> {
    single(device::IMU_BASE_RATE, &[])
}

/// 3DM set: filter data base rate query.
pub fn filter_base_rate() -> Result<Bytes> {
    single(device::FILTER_BASE_RATE, &[])
}

/// 3DM set: diagnostic status report.
pub fn diagnostic_info() -> Result<Bytes> {
    let mut data = Vec::with_capacity(3);
    data.put_u16(DIAGNOSTIC_MODEL_NUMBER);
    data.put_u8(DIAGNOSTIC_SELECTOR);
    single(device::DEVICE_STATUS, &data)
}

/// 3DM set: IMU message format. The rate is `base rate / decimation`.
pub fn imu_message_format(decimation: u16, sources: ImuFields) -> Result<Bytes> {
    message_format(device::IMU_MESSAGE_FORMAT, decimation, &sources.descriptors())
}

/// 3DM set: estimation filter message format.
pub fn filter_message_format(decimation: u16, sources: FilterFields) -> Result<Bytes> {
    message_format(device::FILTER_MESSAGE_FORMAT, decimation, &sources.descriptors())
}

fn message_format(field: u8, decimation: u16, descriptors: &[u8]) -> Result<Bytes> {
    if decimation == 0 {
        return Err(SessionError::InvalidArgument(
            "decimation must be non-zero".to_string(),
        ));
    }
    if descriptors.is_empty() {
        return Err(SessionError::InvalidArgument(
            "at least one data source is required".to_string(),
        ));
    }

    let mut data = Vec::with_capacity(2 + 3 * descriptors.len());
    data.put_u8(FUNCTION_APPLY);
    data.put_u8(descriptors.len() as u8);
    for &descriptor in descriptors {
        data.put_u8(descriptor);
        data.put_u16(decimation);
    }
    single(field, &data)
}

/// 3DM set: enable or disable one continuous data stream.
pub fn enable_stream(selector: u8, enabled: bool) -> Result<Bytes> {
    single(
        device::ENABLE_DATA_STREAM,
        &[FUNCTION_APPLY, selector, u8::from(enabled)],
    )
}

/// 3DM set: take the PPS input from the GPIO pin, or ignore it.
pub fn pps_source(enabled: bool) -> Result<Bytes> {
    let source = if enabled { PPS_GPIO } else { PPS_DISABLED };
    single(device::PPS_SOURCE, &[FUNCTION_APPLY, source])
}

/// Base set: one half of a GPS time update.
pub fn gps_time_update(selector: u8, value: u32) -> Result<Bytes> {
    let mut data = Vec::with_capacity(6);
    data.put_u8(FUNCTION_APPLY);
    data.put_u8(selector);
    data.put_u32(value);
    single(base::GPS_TIME_UPDATE, &data)
}

/// Filter set: aiding measurements used by the filter.
pub fn enable_measurements(accel: bool, magnetometer: bool) -> Result<Bytes> {
    let flags = u16::from(accel) | (u16::from(magnetometer) << 1);
    let mut data = Vec::with_capacity(3);
    data.put_u8(FUNCTION_APPLY);
    data.put_u16(flags);
    single(filter::ENABLE_MEASUREMENTS, &data)
}

/// Filter set: gyro bias estimation control flags.
pub fn bias_estimation(enabled: bool) -> Result<Bytes> {
    let mut data = Vec::with_capacity(3);
    data.put_u8(FUNCTION_APPLY);
    data.put_u16(u16::from(enabled));
    single(filter::CONTROL_FLAGS, &data)
}

/// Filter set: magnetometer hard-iron offset in gauss.
pub fn hard_iron_offset(offset: [f32; 3]) -> Result<Bytes> {
    single(filter::HARD_IRON_OFFSET, &apply_floats(&offset))
}

/// Filter set: row-major 3x3 magnetometer soft-iron matrix.
pub fn soft_iron_matrix(matrix: [f32; 9]) -> Result<Bytes> {
    single(filter::SOFT_IRON_MATRIX, &apply_floats(&matrix))
}

fn apply_floats(values: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + 4 * values.len());
    data.put_u8(FUNCTION_APPLY);
    for &value in values {
        data.put_f32(value);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_a_bare_field() {
        assert_eq!(ping().unwrap().as_ref(), &[0x02, base::PING]);
    }

    #[test]
    fn diagnostic_request_carries_model_and_selector() {
        assert_eq!(
            diagnostic_info().unwrap().as_ref(),
            &[0x05, device::DEVICE_STATUS, 0x18, 0x5A, 0x02]
        );
    }

    #[test]
    fn imu_format_lists_each_source_with_decimation() {
        let payload = imu_message_format(10, ImuFields::ACCELEROMETER | ImuFields::GYROSCOPE).unwrap();
        assert_eq!(
            payload.as_ref(),
            &[0x0A, 0x08, FUNCTION_APPLY, 0x02, 0x04, 0x00, 0x0A, 0x05, 0x00, 0x0A]
        );
    }

    #[test]
    fn filter_format_uses_filter_descriptors() {
        let payload = filter_message_format(5, FilterFields::QUATERNION).unwrap();
        assert_eq!(
            payload.as_ref(),
            &[0x07, 0x0A, FUNCTION_APPLY, 0x01, 0x03, 0x00, 0x05]
        );
    }

    #[test]
    fn zero_decimation_is_invalid() {
        assert!(matches!(
            imu_message_format(0, ImuFields::ACCELEROMETER),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_source_set_is_invalid() {
        assert!(matches!(
            filter_message_format(1, FilterFields::empty()),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn stream_toggle() {
        assert_eq!(
            enable_stream(device::STREAM_FILTER, true).unwrap().as_ref(),
            &[0x05, 0x11, FUNCTION_APPLY, 0x03, 0x01]
        );
        assert_eq!(
            enable_stream(device::STREAM_IMU, false).unwrap().as_ref(),
            &[0x05, 0x11, FUNCTION_APPLY, 0x01, 0x00]
        );
    }

    #[test]
    fn measurement_flags() {
        assert_eq!(
            enable_measurements(true, true).unwrap().as_ref(),
            &[0x05, 0x41, FUNCTION_APPLY, 0x00, 0x03]
        );
        assert_eq!(
            enable_measurements(false, true).unwrap().as_ref(),
            &[0x05, 0x41, FUNCTION_APPLY, 0x00, 0x02]
        );
    }

    #[test]
    fn soft_iron_identity_fits_one_field() {
        let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let payload = soft_iron_matrix(identity).unwrap();
        assert_eq!(payload.len(), 2 + 1 + 36);
        assert_eq!(payload[0], 39);
        assert_eq!(&payload[3..7], &1.0f32.to_be_bytes());
    }

    #[test]
    fn gps_time_update_halves() {
        assert_eq!(
            gps_time_update(GPS_WEEK, 2210).unwrap().as_ref(),
            &[0x08, 0x72, FUNCTION_APPLY, GPS_WEEK, 0x00, 0x00, 0x08, 0xA2]
        );
    }
}
