use std::collections::BTreeMap;

use bytes::Buf;
use serde::Serialize;

/// Width of each string in the device information reply.
const INFO_STRING_LEN: usize = 16;

/// Size of the device information reply field data.
pub const DEVICE_INFO_SIZE: usize = 2 + 5 * INFO_STRING_LEN;

/// Size of the diagnostic status reply field data.
pub const DIAGNOSTIC_SIZE: usize = 73;

/// Hardware identification reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub firmware_version: u16,
    pub model_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub lot_number: String,
    /// Sensor ranges, e.g. `5g, 300 deg/s`.
    pub device_options: String,
}

impl DeviceInfo {
    /// Parse the data of a device information reply field.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DEVICE_INFO_SIZE {
            return None;
        }
        let mut buf = data;
        let firmware_version = buf.get_u16();
        let mut next = || {
            let current: &[u8] = buf;
            let (text, rest) = current.split_at(INFO_STRING_LEN);
            buf = rest;
            info_string(text)
        };
        Some(Self {
            firmware_version,
            model_name: next(),
            model_number: next(),
            serial_number: next(),
            lot_number: next(),
            device_options: next(),
        })
    }

    /// Human-readable key/value view.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("firmware_version", self.firmware_version.to_string()),
            ("model_name", self.model_name.clone()),
            ("model_number", self.model_number.clone()),
            ("serial_number", self.serial_number.clone()),
            ("lot_number", self.lot_number.clone()),
            ("device_options", self.device_options.clone()),
        ])
    }
}

fn info_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Device status report (3DM "device status", diagnostic selector).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticFields {
    pub model_number: u16,
    pub selector: u8,
    pub status_flags: u32,
    pub system_timer: u32,
    pub num_pps_pulses: u32,
    pub imu_stream_enabled: u8,
    pub filter_stream_enabled: u8,
    pub imu_packets_dropped: u32,
    pub filter_packets_dropped: u32,
    pub com_bytes_written: u32,
    pub com_bytes_read: u32,
    pub com_num_write_overruns: u32,
    pub com_num_read_overruns: u32,
    pub usb_bytes_written: u32,
    pub usb_bytes_read: u32,
    pub usb_num_write_overruns: u32,
    pub usb_num_read_overruns: u32,
    pub num_imu_parse_errors: u32,
    pub total_imu_messages: u32,
    pub last_imu_message: u32,
    pub quat_status: u16,
    pub beacon_good: u8,
    pub gps_time_init: u8,
}

impl DiagnosticFields {
    /// Parse the data of a device status reply field.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < DIAGNOSTIC_SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            model_number: buf.get_u16(),
            selector: buf.get_u8(),
            status_flags: buf.get_u32(),
            system_timer: buf.get_u32(),
            num_pps_pulses: buf.get_u32(),
            imu_stream_enabled: buf.get_u8(),
            filter_stream_enabled: buf.get_u8(),
            imu_packets_dropped: buf.get_u32(),
            filter_packets_dropped: buf.get_u32(),
            com_bytes_written: buf.get_u32(),
            com_bytes_read: buf.get_u32(),
            com_num_write_overruns: buf.get_u32(),
            com_num_read_overruns: buf.get_u32(),
            usb_bytes_written: buf.get_u32(),
            usb_bytes_read: buf.get_u32(),
            usb_num_write_overruns: buf.get_u32(),
            usb_num_read_overruns: buf.get_u32(),
            num_imu_parse_errors: buf.get_u32(),
            total_imu_messages: buf.get_u32(),
            last_imu_message: buf.get_u32(),
            quat_status: buf.get_u16(),
            beacon_good: buf.get_u8(),
            gps_time_init: buf.get_u8(),
        })
    }

    /// Key/value view with every counter widened to `u32`.
    pub fn to_map(&self) -> BTreeMap<&'static str, u32> {
        BTreeMap::from([
            ("model_number", u32::from(self.model_number)),
            ("selector", u32::from(self.selector)),
            ("status_flags", self.status_flags),
            ("system_timer", self.system_timer),
            ("num_pps_pulses", self.num_pps_pulses),
            ("imu_stream_enabled", u32::from(self.imu_stream_enabled)),
            ("filter_stream_enabled", u32::from(self.filter_stream_enabled)),
            ("imu_packets_dropped", self.imu_packets_dropped),
            ("filter_packets_dropped", self.filter_packets_dropped),
            ("com_bytes_written", self.com_bytes_written),
            ("com_bytes_read", self.com_bytes_read),
            ("com_num_write_overruns", self.com_num_write_overruns),
            ("com_num_read_overruns", self.com_num_read_overruns),
            ("usb_bytes_written", self.usb_bytes_written),
            ("usb_bytes_read", self.usb_bytes_read),
            ("usb_num_write_overruns", self.usb_num_write_overruns),
            ("usb_num_read_overruns", self.usb_num_read_overruns),
            ("num_imu_parse_errors", self.num_imu_parse_errors),
            ("total_imu_messages", self.total_imu_messages),
            ("last_imu_message", self.last_imu_message),
            ("quat_status", u32::from(self.quat_status)),
            ("beacon_good", u32::from(self.beacon_good)),
            ("gps_time_init", u32::from(self.gps_time_init)),
        ])
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn parse_device_info_trims_padding() {
        let info = DeviceInfo::parse(&device_info_data()).unwrap();

        assert_eq!(info.firmware_version, 1102);
        assert_eq!(info.model_name, "3DM-GX4-25");
        assert_eq!(info.serial_number, "6234.12345");
        assert_eq!(info.lot_number, "");
        assert_eq!(info.device_options, "5g, 300 deg/s");
        assert_eq!(info.to_map()["model_number"], "6234-4220");
    }

    #[test]
    fn short_device_info_is_rejected() {
        let data = device_info_data();
        assert!(DeviceInfo::parse(&data[..DEVICE_INFO_SIZE - 1]).is_none());
    }

    #[test]
    fn parse_diagnostic_fields_in_order() {
        let data = diagnostic_data();
        assert_eq!(data.len(), DIAGNOSTIC_SIZE);

        let fields = DiagnosticFields::parse(&data).unwrap();

        assert_eq!(fields.model_number, 6234);
        assert_eq!(fields.selector, 2);
        assert_eq!(fields.system_timer, 123_456);
        assert_eq!(fields.num_pps_pulses, 42);
        assert_eq!(fields.imu_stream_enabled, 1);
        assert_eq!(fields.imu_packets_dropped, 10);
        assert_eq!(fields.last_imu_message, 130);
        assert_eq!(fields.quat_status, 3);
        assert_eq!(fields.gps_time_init, 1);

        let map = fields.to_map();
        assert_eq!(map.len(), 23);
        assert_eq!(map["usb_num_read_overruns"], 100);
    }

    #[test]
    fn device_info_serializes_with_field_names() {
        let info = DeviceInfo::parse(&device_info_data()).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["model_name"], "3DM-GX4-25");
        assert_eq!(json["firmware_version"], 1102);
    }
}
