//! Descriptor sets and field descriptors.
//!
//! Descriptor sets below 0x80 carry commands, 0x80 and above carry data.
//! Values follow the 3DM-GX4 MIP protocol documentation.

/// Base command set (ping, idle, device info, ...).
pub const BASE_COMMAND: u8 = 0x01;

/// 3DM command set (message formats, streaming, UART, diagnostics).
pub const DEVICE_COMMAND: u8 = 0x0C;

/// Estimation filter command set.
pub const FILTER_COMMAND: u8 = 0x0D;

/// IMU data set.
pub const IMU_DATA: u8 = 0x80;

/// Estimation filter data set.
pub const FILTER_DATA: u8 = 0x82;

/// ACK/NACK reply field: `[0x04, 0xF1, echoed field, error code]`.
pub const ACK_FIELD: u8 = 0xF1;

/// Function selector: apply new settings.
pub const FUNCTION_APPLY: u8 = 0x01;

/// Field descriptors of the base command set.
pub mod base {
    pub const PING: u8 = 0x01;
    pub const IDLE: u8 = 0x02;
    pub const DEVICE_INFO: u8 = 0x03;
    pub const RESUME: u8 = 0x06;
    pub const GPS_TIME_UPDATE: u8 = 0x72;

    pub const DEVICE_INFO_REPLY: u8 = 0x81;
}

/// Field descriptors of the 3DM command set.
pub mod device {
    pub const IMU_BASE_RATE: u8 = 0x06;
    pub const IMU_MESSAGE_FORMAT: u8 = 0x08;
    pub const FILTER_MESSAGE_FORMAT: u8 = 0x0A;
    pub const FILTER_BASE_RATE: u8 = 0x0B;
    pub const ENABLE_DATA_STREAM: u8 = 0x11;
    pub const PPS_SOURCE: u8 = 0x28;
    pub const UART_BAUD_RATE: u8 = 0x40;
    pub const DEVICE_STATUS: u8 = 0x64;

    pub const IMU_BASE_RATE_REPLY: u8 = 0x83;
    pub const FILTER_BASE_RATE_REPLY: u8 = 0x8A;
    pub const DEVICE_STATUS_REPLY: u8 = 0x90;

    /// Stream selectors for `ENABLE_DATA_STREAM`.
    pub const STREAM_IMU: u8 = 0x01;
    pub const STREAM_FILTER: u8 = 0x03;
}

/// Field descriptors of the filter command set.
pub mod filter {
    pub const CONTROL_FLAGS: u8 = 0x14;
    pub const HARD_IRON_OFFSET: u8 = 0x3A;
    pub const SOFT_IRON_MATRIX: u8 = 0x3B;
    pub const ENABLE_MEASUREMENTS: u8 = 0x41;
}

/// Field descriptors inside [`IMU_DATA`](super::IMU_DATA) packets.
pub mod imu_field {
    pub const ACCELEROMETER: u8 = 0x04;
    pub const GYROSCOPE: u8 = 0x05;
    pub const MAGNETOMETER: u8 = 0x06;
    pub const GPS_CORRELATION: u8 = 0x12;
    pub const PRESSURE: u8 = 0x17;
}

/// Field descriptors inside [`FILTER_DATA`](super::FILTER_DATA) packets.
pub mod filter_field {
    pub const QUATERNION: u8 = 0x03;
    pub const GYRO_BIAS: u8 = 0x06;
    pub const GPS_TIME: u8 = 0x09;
    pub const ANGLE_UNCERTAINTY: u8 = 0x0A;
    pub const BIAS_UNCERTAINTY: u8 = 0x0B;
}

/// Category of an incoming frame, by descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    ImuData,
    FilterData,
    /// Anything else: command replies, unsolicited data sets.
    Other,
}

/// Descriptor-to-category mapping used when classifying frames.
///
/// Defaults match the 3DM-GX4; override for firmware that remaps sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTable {
    pub imu_data: u8,
    pub filter_data: u8,
    pub ack_field: u8,
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self {
            imu_data: IMU_DATA,
            filter_data: FILTER_DATA,
            ack_field: ACK_FIELD,
        }
    }
}

impl DescriptorTable {
    /// Classify a frame descriptor.
    pub fn classify(&self, descriptor: u8) -> FrameKind {
        if descriptor == self.imu_data {
            FrameKind::ImuData
        } else if descriptor == self.filter_data {
            FrameKind::FilterData
        } else {
            FrameKind::Other
        }
    }
}

/// Returns a human-readable name for a descriptor set.
pub fn descriptor_name(descriptor: u8) -> &'static str {
    match descriptor {
        BASE_COMMAND => "BASE_COMMAND",
        DEVICE_COMMAND => "DEVICE_COMMAND",
        FILTER_COMMAND => "FILTER_COMMAND",
        IMU_DATA => "IMU_DATA",
        FILTER_DATA => "FILTER_DATA",
        0x00..=0x7F => "COMMAND",
        _ => "DATA",
    }
}

/// Returns true if the descriptor set carries commands and replies.
pub fn is_command_set(descriptor: u8) -> bool {
    descriptor < 0x80
}
