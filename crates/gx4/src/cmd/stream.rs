use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gx4_device::Device;
use gx4_session::{FilterData, ImuData};
use gx4_transport::SerialTransport;
use tracing::{info, warn};

use crate::cmd::{connect, filter_fields, imu_fields, StreamArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_filter, print_imu, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let want_imu = args.imu || !args.filter;
    let want_filter = args.filter;

    let mut device = connect(&args.connect)?;
    device
        .idle()
        .map_err(|err| session_error("idle failed", err))?;

    if want_imu {
        device
            .set_imu_data_rate(args.decimation, imu_fields(&args.imu_fields))
            .map_err(|err| session_error("imu message format failed", err))?;
    }
    if want_filter {
        device
            .set_filter_data_rate(args.decimation, filter_fields(&args.filter_fields))
            .map_err(|err| session_error("filter message format failed", err))?;
    }

    let budget = Arc::new(RecordBudget::new(args.count));
    let imu_observer = {
        let budget = budget.clone();
        Arc::new(move |data: &ImuData| {
            if budget.claim() {
                print_imu(data, format);
            }
        })
    };
    let filter_observer = {
        let budget = budget.clone();
        Arc::new(move |data: &FilterData| {
            if budget.claim() {
                print_filter(data, format);
            }
        })
    };
    device.set_imu_observer(&imu_observer);
    device.set_filter_observer(&filter_observer);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    device
        .enable_imu_stream(want_imu)
        .map_err(|err| session_error("imu stream toggle failed", err))?;
    device
        .enable_filter_stream(want_filter)
        .map_err(|err| session_error("filter stream toggle failed", err))?;
    device
        .resume()
        .map_err(|err| session_error("resume failed", err))?;

    let result = receive(&mut device, &running, &budget);
    stop_streams(&mut device);

    let stats = device.stats();
    info!(
        imu_records = stats.imu_records,
        filter_records = stats.filter_records,
        malformed_records = stats.malformed_records,
        "stream finished"
    );
    device.disconnect();

    result.map(|()| SUCCESS)
}

/// Printed record counter capped by `--count`.
#[derive(Debug)]
struct RecordBudget {
    printed: AtomicUsize,
    limit: Option<usize>,
}

impl RecordBudget {
    fn new(limit: Option<usize>) -> Self {
        Self {
            printed: AtomicUsize::new(0),
            limit,
        }
    }

    /// Take one slot. False once the limit is reached; the record is dropped.
    fn claim(&self) -> bool {
        self.printed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            })
            .is_ok()
    }

    fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.printed.load(Ordering::SeqCst) >= limit)
    }
}

fn receive(
    device: &mut Device<SerialTransport>,
    running: &AtomicBool,
    budget: &RecordBudget,
) -> CliResult<()> {
    while running.load(Ordering::SeqCst) && !budget.exhausted() {
        device
            .run_once(POLL_INTERVAL)
            .map_err(|err| session_error("receive failed", err))?;
    }
    Ok(())
}

fn stop_streams(device: &mut Device<SerialTransport>) {
    for (name, result) in [
        ("imu", device.enable_imu_stream(false)),
        ("filter", device.enable_filter_stream(false)),
    ] {
        if let Err(err) = result {
            warn!(stream = name, error = %err, "failed to disable stream");
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
