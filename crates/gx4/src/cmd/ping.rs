use std::time::Instant;

use serde::Serialize;

use crate::cmd::{connect, PingArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat};

#[derive(Serialize)]
struct PingOutput<'a> {
    port: &'a str,
    baud: u32,
    latency_ms: f64,
}

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let mut device = connect(&args.connect)?;

    let started = Instant::now();
    device.ping().map_err(|err| session_error("ping failed", err))?;
    let latency_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = PingOutput {
        port: &args.connect.port,
        baud: args.connect.baud,
        latency_ms,
    };
    print_report(
        &out,
        &[
            ("port", out.port.to_string()),
            ("baud", out.baud.to_string()),
            ("latency_ms", format!("{latency_ms:.2}")),
        ],
        format,
    );
    Ok(SUCCESS)
}
