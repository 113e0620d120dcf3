//! Baud rate discovery and switching.
//!
//! A powered device keeps whatever rate it was last set to, so the host
//! first probes every supported rate with a ping, then commands the device
//! to the target rate at the rate it answered on and follows it.

use std::time::Duration;

use gx4_frame::descriptor::{base, device, BASE_COMMAND, DEVICE_COMMAND, FUNCTION_APPLY};
use gx4_frame::PayloadBuilder;
use gx4_transport::ByteTransport;
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::session::Session;

/// Baud rates the device's UART supports.
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 19200, 115_200, 230_400, 460_800, 921_600];

/// Configuration for baud negotiation.
#[derive(Debug, Clone)]
pub struct BaudConfig {
    /// How long to wait for a ping reply at each candidate rate.
    pub probe_timeout: Duration,
    /// Rates to probe, in order.
    pub candidates: Vec<u32>,
}

impl Default for BaudConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(100),
            candidates: SUPPORTED_BAUD_RATES.to_vec(),
        }
    }
}

/// Outcome of [`select_baud_rate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudSelection {
    /// Rate the device was answering on.
    pub discovered: u32,
    /// Rate both sides use now.
    pub selected: u32,
}

impl BaudSelection {
    /// True if a rate change command was sent.
    pub fn switched(&self) -> bool {
        self.discovered != self.selected
    }
}

/// Discover the device's current rate and switch both sides to `target`.
pub fn select_baud_rate<T: ByteTransport>(session: &mut Session<T>, target: u32) -> Result<BaudSelection> {
    select_baud_rate_with_config(session, target, &BaudConfig::default())
}

/// [`select_baud_rate`] with explicit probe settings.
pub fn select_baud_rate_with_config<T: ByteTransport>(
    session: &mut Session<T>,
    target: u32,
    config: &BaudConfig,
) -> Result<BaudSelection> {
    if !SUPPORTED_BAUD_RATES.contains(&target) {
        return Err(SessionError::InvalidArgument(format!(
            "unsupported baud rate {target} (supported: {SUPPORTED_BAUD_RATES:?})"
        )));
    }

    let discovered = discover_baud_rate(session, config)?;
    if discovered == target {
        info!(baud_rate = target, "device already at target baud rate");
        return Ok(BaudSelection {
            discovered,
            selected: target,
        });
    }

    let payload = PayloadBuilder::new()
        .field(device::UART_BAUD_RATE, &baud_command_data(target))?
        .finish();
    let timeout = session.config().command_timeout;
    session.send_command(DEVICE_COMMAND, &payload, timeout)?;
    session.reconfigure(target)?;

    info!(from = discovered, to = target, "switched baud rate");
    Ok(BaudSelection {
        discovered,
        selected: target,
    })
}

/// Probe each candidate rate with a ping and return the first that answers.
///
/// Any reply counts, including a NACK. Transport failures abort the probe.
/// Candidates outside [`SUPPORTED_BAUD_RATES`] are rejected before any I/O.
pub fn discover_baud_rate<T: ByteTransport>(session: &mut Session<T>, config: &BaudConfig) -> Result<u32> {
    if config.candidates.is_empty() {
        return Err(SessionError::InvalidArgument(
            "no candidate baud rates to probe".to_string(),
        ));
    }
    if let Some(rate) = config
        .candidates
        .iter()
        .copied()
        .find(|rate| !SUPPORTED_BAUD_RATES.contains(rate))
    {
        return Err(SessionError::InvalidArgument(format!(
            "unsupported candidate baud rate {rate}"
        )));
    }

    let ping = [0x02, base::PING];
    for &rate in &config.candidates {
        session.reconfigure(rate)?;
        match session.send_command(BASE_COMMAND, &ping, config.probe_timeout) {
            Ok(_) | Err(SessionError::Command { .. }) => {
                info!(baud_rate = rate, "device answered");
                return Ok(rate);
            }
            Err(SessionError::Timeout { .. }) => {
                debug!(baud_rate = rate, "no answer at candidate rate");
            }
            Err(err) => return Err(err),
        }
    }
    Err(SessionError::DeviceUnresponsive {
        tried: config.candidates.clone(),
    })
}

fn baud_command_data(baud_rate: u32) -> [u8; 5] {
    let [a, b, c, d] = baud_rate.to_be_bytes();
    [FUNCTION_APPLY, a, b, c, d]
}
