use gx4_session::{BaudConfig, SUPPORTED_BAUD_RATES};
use serde::Serialize;

use crate::cmd::{connect, parse_timeout, BaudArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat};

#[derive(Serialize)]
struct BaudOutput<'a> {
    port: &'a str,
    discovered: u32,
    selected: u32,
    switched: bool,
}

pub fn run(args: BaudArgs, format: OutputFormat) -> CliResult<i32> {
    if !SUPPORTED_BAUD_RATES.contains(&args.target) {
        return Err(CliError::usage(format!(
            "unsupported baud rate {} (supported: {SUPPORTED_BAUD_RATES:?})",
            args.target
        )));
    }
    let probe_timeout = parse_timeout(&args.probe_timeout)?;

    let mut device = connect(&args.connect)?;
    device.set_baud_config(BaudConfig {
        probe_timeout,
        ..BaudConfig::default()
    });

    let selection = device
        .select_baud_rate(args.target)
        .map_err(|err| session_error("baud selection failed", err))?;

    let out = BaudOutput {
        port: &args.connect.port,
        discovered: selection.discovered,
        selected: selection.selected,
        switched: selection.switched(),
    };
    print_report(
        &out,
        &[
            ("port", out.port.to_string()),
            ("discovered", out.discovered.to_string()),
            ("selected", out.selected.to_string()),
            ("switched", out.switched.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}
