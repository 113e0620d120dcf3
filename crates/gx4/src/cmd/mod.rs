use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use gx4_device::Device;
use gx4_session::{FilterFields, ImuFields, SessionConfig};
use gx4_transport::SerialTransport;

use crate::exit::{transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod baud;
pub mod diag;
pub mod info;
pub mod ping;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the device answers.
    Ping(PingArgs),
    /// Print device identification and data base rates.
    Info(InfoArgs),
    /// Print the diagnostic status report.
    Diag(DiagArgs),
    /// Discover the current baud rate and switch to a new one.
    Baud(BaudArgs),
    /// Stream IMU and/or filter records.
    Stream(StreamArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Diag(args) => diag::run(args, format),
        Command::Baud(args) => baud::run(args, format),
        Command::Stream(args) => stream::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial connection options shared by every device command.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Serial device path.
    #[arg(long, short = 'p', env = "GX4_PORT")]
    pub port: String,
    /// Baud rate to open the port at.
    #[arg(long, short = 'b', env = "GX4_BAUD", default_value = "115200")]
    pub baud: u32,
    /// Command reply timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct DiagArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct BaudArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Rate to switch the device and the port to.
    pub target: u32,
    /// Ping timeout at each probed rate (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub probe_timeout: String,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Stream IMU records (default when no source is given).
    #[arg(long)]
    pub imu: bool,
    /// Stream estimation filter records.
    #[arg(long)]
    pub filter: bool,
    /// IMU groups to request (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "accel,gyro,mag")]
    pub imu_fields: Vec<ImuSource>,
    /// Filter groups to request (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "quaternion,bias")]
    pub filter_fields: Vec<FilterSource>,
    /// Base rate divider for both streams.
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u16).range(1..))]
    pub decimation: u16,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ImuSource {
    Accel,
    Gyro,
    Mag,
    Pressure,
    GpsTime,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FilterSource {
    Quaternion,
    Bias,
    AngleUncertainty,
    BiasUncertainty,
    GpsTime,
}

pub fn imu_fields(sources: &[ImuSource]) -> ImuFields {
    sources.iter().fold(ImuFields::empty(), |fields, source| {
        fields
            | match source {
                ImuSource::Accel => ImuFields::ACCELEROMETER,
                ImuSource::Gyro => ImuFields::GYROSCOPE,
                ImuSource::Mag => ImuFields::MAGNETOMETER,
                ImuSource::Pressure => ImuFields::BAROMETER,
                ImuSource::GpsTime => ImuFields::GPS_TIME,
            }
    })
}

pub fn filter_fields(sources: &[FilterSource]) -> FilterFields {
    sources.iter().fold(FilterFields::empty(), |fields, source| {
        fields
            | match source {
                FilterSource::Quaternion => FilterFields::QUATERNION,
                FilterSource::Bias => FilterFields::BIAS,
                FilterSource::AngleUncertainty => FilterFields::ANGLE_UNCERTAINTY,
                FilterSource::BiasUncertainty => FilterFields::BIAS_UNCERTAINTY,
                FilterSource::GpsTime => FilterFields::GPS_TIME,
            }
    })
}

/// Open the serial port and wrap it in a device handle.
pub fn connect(args: &ConnectArgs) -> CliResult<Device<SerialTransport>> {
    let config = SessionConfig {
        command_timeout: parse_timeout(&args.timeout)?,
        ..SessionConfig::default()
    };
    let transport = SerialTransport::open(args.port.as_str(), args.baud)
        .map_err(|err| transport_error(&format!("open {} failed", args.port), err))?;
    Ok(Device::with_config(transport, config))
}

/// Parse `5s`, `150ms` or bare seconds. Zero is rejected.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let value = input.trim();
    if value.is_empty() {
        return Err(CliError::usage("timeout cannot be empty"));
    }

    let duration = if let Some(ms) = value.strip_suffix("ms") {
        let ms = ms
            .trim()
            .parse::<u64>()
            .map_err(|_| CliError::usage(format!("invalid timeout: {input}")))?;
        Duration::from_millis(ms)
    } else {
        let secs = value.strip_suffix('s').unwrap_or(value);
        let secs = secs
            .trim()
            .parse::<u64>()
            .map_err(|_| CliError::usage(format!("invalid timeout: {input}")))?;
        Duration::from_secs(secs)
    };

    if duration.is_zero() {
        return Err(CliError::usage("timeout must be greater than zero"));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parse_timeout_accepts_units() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_timeout(" 2 ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_timeout_rejects_zero_and_garbage() {
        assert_eq!(parse_timeout("0ms").unwrap_err().code, USAGE);
        assert_eq!(parse_timeout("").unwrap_err().code, USAGE);
        assert_eq!(parse_timeout("fast").unwrap_err().code, USAGE);
    }

    #[test]
    fn sources_fold_into_flags() {
        assert_eq!(
            imu_fields(&[ImuSource::Accel, ImuSource::Gyro]),
            ImuFields::ACCELEROMETER | ImuFields::GYROSCOPE
        );
        assert_eq!(
            filter_fields(&[FilterSource::Quaternion, FilterSource::GpsTime]),
            FilterFields::QUATERNION | FilterFields::GPS_TIME
        );
        assert!(imu_fields(&[]).is_empty());
    }
}
