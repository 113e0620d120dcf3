use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

use crate::error::{Direction, Result, TransportError};
use crate::traits::ByteTransport;

/// Serial port transport backed by the `serialport` crate.
///
/// Line discipline is 8N1 without flow control, which is what MIP devices
/// expect out of the box.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Timeout applied when the port is first opened.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

    /// Open `path` at `baud_rate`.
    pub fn open(path: impl Into<String>, baud_rate: u32) -> Result<Self> {
        let path = path.into();
        let port = serialport::new(path.as_str(), baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Self::DEFAULT_TIMEOUT)
            .open()?;

        info!(%path, baud_rate, "opened serial port");

        Ok(Self {
            port,
            path,
            baud_rate,
        })
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ByteTransport for SerialTransport {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.port.set_timeout(timeout)?;
        loop {
            return match self.port.read(buf) {
                Ok(0) => Err(TransportError::Timeout {
                    direction: Direction::Read,
                    timeout,
                }),
                Ok(n) => Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock => {
                    Err(TransportError::Timeout {
                        direction: Direction::Read,
                        timeout,
                    })
                }
                Err(err) => Err(TransportError::Io(err)),
            };
        }
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        let written = match self.port.write(bytes) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock => {
                return Err(TransportError::Timeout {
                    direction: Direction::Write,
                    timeout,
                })
            }
            Err(err) => return Err(TransportError::Io(err)),
        };
        self.port.flush()?;
        Ok(written)
    }

    fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        // Bytes received at the old rate are line noise now.
        self.port.clear(ClearBuffer::Input)?;
        debug!(path = %self.path, baud_rate, "reconfigured serial port");
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> Option<u32> {
        Some(self.baud_rate)
    }

    fn transport_name(&self) -> &'static str {
        "serial"
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device_fails() {
        let result = SerialTransport::open("/dev/gx4-does-not-exist", 115_200);
        assert!(matches!(result, Err(TransportError::Serial(_))));
    }
}
