use gx4_device::DeviceInfo;
use serde::Serialize;

use crate::cmd::{connect, InfoArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat};

#[derive(Serialize)]
struct InfoOutput<'a> {
    port: &'a str,
    baud: u32,
    device: DeviceInfo,
    imu_base_rate_hz: u16,
    filter_base_rate_hz: u16,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut device = connect(&args.connect)?;

    let info = device
        .device_info()
        .map_err(|err| session_error("device info failed", err))?;
    let imu_base_rate_hz = device
        .imu_base_rate()
        .map_err(|err| session_error("imu base rate query failed", err))?;
    let filter_base_rate_hz = device
        .filter_base_rate()
        .map_err(|err| session_error("filter base rate query failed", err))?;

    let mut rows: Vec<(&str, String)> = vec![
        ("port", args.connect.port.clone()),
        ("baud", args.connect.baud.to_string()),
    ];
    rows.extend(info.to_map());
    rows.push(("imu_base_rate_hz", imu_base_rate_hz.to_string()));
    rows.push(("filter_base_rate_hz", filter_base_rate_hz.to_string()));

    let out = InfoOutput {
        port: &args.connect.port,
        baud: args.connect.baud,
        device: info,
        imu_base_rate_hz,
        filter_base_rate_hz,
    };
    print_report(&out, &rows, format);
    Ok(SUCCESS)
}
