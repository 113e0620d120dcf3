//! Telemetry record decoding.
//!
//! Two payload layouts are understood, see [`TelemetryLayout`]. Numbers are
//! big-endian in both; the field groups and their sizes are the same.

use bitflags::bitflags;
use bytes::Buf;
use gx4_frame::descriptor::{filter_field, imu_field};
use gx4_frame::FrameError;

const VECTOR_SIZE: usize = 12;
const SCALAR_SIZE: usize = 4;
const GPS_TIME_SIZE: usize = 12;
const QUATERNION_SIZE: usize = 18;
const ESTIMATE_SIZE: usize = 14;

/// How a telemetry payload announces which field groups it carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TelemetryLayout {
    /// Byte 0 is a presence mask; the flagged groups follow in canonical order.
    #[default]
    PresenceMask,
    /// MIP field records (`[len, descriptor, data]`), one per group.
    FieldRecords,
}

bitflags! {
    /// Field groups of an IMU record.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ImuFields: u8 {
        const ACCELEROMETER = 1 << 0;
        const GYROSCOPE = 1 << 1;
        const MAGNETOMETER = 1 << 2;
        const BAROMETER = 1 << 3;
        const GPS_TIME = 1 << 4;
    }
}

bitflags! {
    /// Field groups of an estimation filter record.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct FilterFields: u8 {
        const QUATERNION = 1 << 0;
        const BIAS = 1 << 1;
        const ANGLE_UNCERTAINTY = 1 << 2;
        const BIAS_UNCERTAINTY = 1 << 3;
        const GPS_TIME = 1 << 4;
    }
}

/// Why a telemetry payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("empty telemetry payload")]
    Empty,

    #[error("unknown presence bits {0:#04x}")]
    UnknownFields(u8),

    #[error("{group} needs {needed} bytes, {available} available")]
    Truncated {
        group: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("malformed field record: {0}")]
    Record(#[from] FrameError),
}

/// GPS timestamp attached to a record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsTime {
    /// Seconds since the start of the GPS week.
    pub time_of_week: f64,
    pub week: u16,
    pub status: u16,
}

/// An estimate together with the filter's validity flags for it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Estimate<T> {
    pub value: T,
    pub status: u16,
}

/// One decoded IMU record.
///
/// Groups not flagged in [`fields`](Self::fields) read as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuData {
    fields: ImuFields,
    accel: [f32; 3],
    gyro: [f32; 3],
    mag: [f32; 3],
    pressure: f32,
    gps_time: GpsTime,
}

impl ImuData {
    pub fn fields(&self) -> ImuFields {
        self.fields
    }

    /// Acceleration in g.
    pub fn accel(&self) -> Option<[f32; 3]> {
        self.fields
            .contains(ImuFields::ACCELEROMETER)
            .then_some(self.accel)
    }

    /// Angular rate in rad/s.
    pub fn gyro(&self) -> Option<[f32; 3]> {
        self.fields.contains(ImuFields::GYROSCOPE).then_some(self.gyro)
    }

    /// Magnetic field in gauss.
    pub fn mag(&self) -> Option<[f32; 3]> {
        self.fields.contains(ImuFields::MAGNETOMETER).then_some(self.mag)
    }

    pub fn pressure(&self) -> Option<f32> {
        self.fields
            .contains(ImuFields::BAROMETER)
            .then_some(self.pressure)
    }

    pub fn gps_time(&self) -> Option<GpsTime> {
        self.fields.contains(ImuFields::GPS_TIME).then_some(self.gps_time)
    }
}

/// One decoded estimation filter record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterData {
    fields: FilterFields,
    quaternion: Estimate<[f32; 4]>,
    bias: Estimate<[f32; 3]>,
    angle_uncertainty: Estimate<[f32; 3]>,
    bias_uncertainty: Estimate<[f32; 3]>,
    gps_time: GpsTime,
}

impl FilterData {
    pub fn fields(&self) -> FilterFields {
        self.fields
    }

    /// Orientation quaternion `[w, x, y, z]`.
    pub fn quaternion(&self) -> Option<Estimate<[f32; 4]>> {
        self.fields
            .contains(FilterFields::QUATERNION)
            .then_some(self.quaternion)
    }

    /// Gyro bias in rad/s.
    pub fn bias(&self) -> Option<Estimate<[f32; 3]>> {
        self.fields.contains(FilterFields::BIAS).then_some(self.bias)
    }

    /// Euler angle uncertainty in radians.
    pub fn angle_uncertainty(&self) -> Option<Estimate<[f32; 3]>> {
        self.fields
            .contains(FilterFields::ANGLE_UNCERTAINTY)
            .then_some(self.angle_uncertainty)
    }

    pub fn bias_uncertainty(&self) -> Option<Estimate<[f32; 3]>> {
        self.fields
            .contains(FilterFields::BIAS_UNCERTAINTY)
            .then_some(self.bias_uncertainty)
    }

    pub fn gps_time(&self) -> Option<GpsTime> {
        self.fields
            .contains(FilterFields::GPS_TIME)
            .then_some(self.gps_time)
    }
}

/// A field group: its presence bit, record descriptor, size and reader.
struct Group<R> {
    flag: u8,
    descriptor: u8,
    size: usize,
    name: &'static str,
    read: fn(&mut R, &mut &[u8]),
}

const IMU_GROUPS: [Group<ImuData>; 5] = [
    Group {
        flag: ImuFields::ACCELEROMETER.bits(),
        descriptor: imu_field::ACCELEROMETER,
        size: VECTOR_SIZE,
        name: "accelerometer",
        read: read_accel,
    },
    Group {
        flag: ImuFields::GYROSCOPE.bits(),
        descriptor: imu_field::GYROSCOPE,
        size: VECTOR_SIZE,
        name: "gyroscope",
        read: read_gyro,
    },
    Group {
        flag: ImuFields::MAGNETOMETER.bits(),
        descriptor: imu_field::MAGNETOMETER,
        size: VECTOR_SIZE,
        name: "magnetometer",
        read: read_mag,
    },
    Group {
        flag: ImuFields::BAROMETER.bits(),
        descriptor: imu_field::PRESSURE,
        size: SCALAR_SIZE,
        name: "barometer",
        read: read_pressure,
    },
    Group {
        flag: ImuFields::GPS_TIME.bits(),
        descriptor: imu_field::GPS_CORRELATION,
        size: GPS_TIME_SIZE,
        name: "imu gps time",
        read: read_imu_gps_time,
    },
];

const FILTER_GROUPS: [Group<FilterData>; 5] = [
    Group {
        flag: FilterFields::QUATERNION.bits(),
        descriptor: filter_field::QUATERNION,
        size: QUATERNION_SIZE,
        name: "quaternion",
        read: read_quaternion,
    },
    Group {
        flag: FilterFields::BIAS.bits(),
        descriptor: filter_field::GYRO_BIAS,
        size: ESTIMATE_SIZE,
        name: "gyro bias",
        read: read_bias,
    },
    Group {
        flag: FilterFields::ANGLE_UNCERTAINTY.bits(),
        descriptor: filter_field::ANGLE_UNCERTAINTY,
        size: ESTIMATE_SIZE,
        name: "angle uncertainty",
        read: read_angle_uncertainty,
    },
    Group {
        flag: FilterFields::BIAS_UNCERTAINTY.bits(),
        descriptor: filter_field::BIAS_UNCERTAINTY,
        size: ESTIMATE_SIZE,
        name: "bias uncertainty",
        read: read_bias_uncertainty,
    },
    Group {
        flag: FilterFields::GPS_TIME.bits(),
        descriptor: filter_field::GPS_TIME,
        size: GPS_TIME_SIZE,
        name: "filter gps time",
        read: read_filter_gps_time,
    },
];

impl ImuFields {
    /// Field record descriptors of the flagged groups, in canonical order.
    pub fn descriptors(self) -> Vec<u8> {
        group_descriptors(&IMU_GROUPS, self.bits())
    }
}

impl FilterFields {
    /// Field record descriptors of the flagged groups, in canonical order.
    pub fn descriptors(self) -> Vec<u8> {
        group_descriptors(&FILTER_GROUPS, self.bits())
    }
}

fn group_descriptors<R>(groups: &[Group<R>], bits: u8) -> Vec<u8> {
    groups
        .iter()
        .filter(|group| bits & group.flag != 0)
        .map(|group| group.descriptor)
        .collect()
}

/// Decode the payload of an IMU data frame.
pub fn decode_imu(payload: &[u8], layout: TelemetryLayout) -> Result<ImuData, TelemetryError> {
    let (mut data, present): (ImuData, u8) = decode_groups(payload, layout, &IMU_GROUPS)?;
    data.fields = ImuFields::from_bits_retain(present);
    Ok(data)
}

/// Decode the payload of an estimation filter data frame.
pub fn decode_filter(
    payload: &[u8],
    layout: TelemetryLayout,
) -> Result<FilterData, TelemetryError> {
    let (mut data, present): (FilterData, u8) = decode_groups(payload, layout, &FILTER_GROUPS)?;
    data.fields = FilterFields::from_bits_retain(present);
    Ok(data)
}

fn decode_groups<R: Default>(
    payload: &[u8],
    layout: TelemetryLayout,
    groups: &[Group<R>],
) -> Result<(R, u8), TelemetryError> {
    let mut record = R::default();
    let mut present = 0u8;

    match layout {
        TelemetryLayout::PresenceMask => {
            let (&mask, mut rest) = payload.split_first().ok_or(TelemetryError::Empty)?;
            let known = groups.iter().fold(0u8, |acc, group| acc | group.flag);
            if mask & !known != 0 {
                return Err(TelemetryError::UnknownFields(mask & !known));
            }
            for group in groups.iter().filter(|group| mask & group.flag != 0) {
                let mut raw = take(&mut rest, group)?;
                (group.read)(&mut record, &mut raw);
                present |= group.flag;
            }
        }
        TelemetryLayout::FieldRecords => {
            for field in gx4_frame::fields(payload) {
                let field = field?;
                let Some(group) = groups.iter().find(|g| g.descriptor == field.descriptor) else {
                    continue;
                };
                let mut data = field.data;
                let mut raw = take(&mut data, group)?;
                (group.read)(&mut record, &mut raw);
                present |= group.flag;
            }
        }
    }

    Ok((record, present))
}

fn take<'a, R>(buf: &mut &'a [u8], group: &Group<R>) -> Result<&'a [u8], TelemetryError> {
    if buf.len() < group.size {
        return Err(TelemetryError::Truncated {
            group: group.name,
            needed: group.size,
            available: buf.len(),
        });
    }
    let (head, rest) = buf.split_at(group.size);
    *buf = rest;
    Ok(head)
}

fn vector(raw: &mut &[u8]) -> [f32; 3] {
    [raw.get_f32(), raw.get_f32(), raw.get_f32()]
}

fn gps_time(raw: &mut &[u8]) -> GpsTime {
    GpsTime {
        time_of_week: raw.get_f64(),
        week: raw.get_u16(),
        status: raw.get_u16(),
    }
}

fn estimate(raw: &mut &[u8]) -> Estimate<[f32; 3]> {
    Estimate {
        value: vector(raw),
        status: raw.get_u16(),
    }
}

fn read_accel(data: &mut ImuData, raw: &mut &[u8]) {
    data.accel = vector(raw);
}

fn read_gyro(data: &mut ImuData, raw: &mut &[u8]) {
    data.gyro = vector(raw);
}

fn read_mag(data: &mut ImuData, raw: &mut &[u8]) {
    data.mag = vector(raw);
}

fn read_pressure(data: &mut ImuData, raw: &mut &[u8]) {
    data.pressure = raw.get_f32();
}

fn read_imu_gps_time(data: &mut ImuData, raw: &mut &[u8]) {
    data.gps_time = gps_time(raw);
}

fn read_quaternion(data: &mut FilterData, raw: &mut &[u8]) {
    data.quaternion = Estimate {
        value: [raw.get_f32(), raw.get_f32(), raw.get_f32(), raw.get_f32()],
        status: raw.get_u16(),
    };
}

fn read_bias(data: &mut FilterData, raw: &mut &[u8]) {
    data.bias = estimate(raw);
}

fn read_angle_uncertainty(data: &mut FilterData, raw: &mut &[u8]) {
    data.angle_uncertainty = estimate(raw);
}

fn read_bias_uncertainty(data: &mut FilterData, raw: &mut &[u8]) {
    data.bias_uncertainty = estimate(raw);
}

fn read_filter_gps_time(data: &mut FilterData, raw: &mut &[u8]) {
    data.gps_time = gps_time(raw);
}
