use crate::cmd::{connect, DiagArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_report, OutputFormat};

pub fn run(args: DiagArgs, format: OutputFormat) -> CliResult<i32> {
    let mut device = connect(&args.connect)?;

    let fields = device
        .diagnostic_info()
        .map_err(|err| session_error("diagnostic query failed", err))?;

    let rows: Vec<(&str, String)> = fields
        .to_map()
        .into_iter()
        .map(|(key, value)| (key, value.to_string()))
        .collect();
    print_report(&fields, &rows, format);
    Ok(SUCCESS)
}
