//! In-memory device simulator for exercising sessions without hardware.
//!
//! [`SimulatedDevice`] answers every command it understands with an ACK
//! (or a configured NACK), optionally followed by reply fields. It only
//! understands bytes written while the host side runs at the same baud
//! rate as the device, and it follows UART baud rate commands.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use gx4_frame::descriptor::{device, ACK_FIELD, DEVICE_COMMAND};
use gx4_frame::{encode, Frame, PayloadBuilder, Reassembler};
use gx4_transport::error::Direction;
use gx4_transport::{ByteTransport, Result, TransportError};

/// Longest a read on an empty line sleeps before reporting a timeout.
const IDLE_READ: Duration = Duration::from_millis(1);

/// A scripted MIP device speaking over an in-memory line.
#[derive(Debug)]
pub struct SimulatedDevice {
    inbound: VecDeque<u8>,
    parser: Reassembler,
    commands: Vec<Frame>,
    host_baud: u32,
    device_baud: u32,
    chunk_size: usize,
    silent: bool,
    nacks: HashMap<(u8, u8), u8>,
    reply_fields: HashMap<(u8, u8), Vec<(u8, Vec<u8>)>>,
    read_error: Option<io::ErrorKind>,
    reconfigurations: Vec<u32>,
}

impl SimulatedDevice {
    /// A device and host both running at `baud_rate`.
    pub fn new(baud_rate: u32) -> Self {
        Self::at_baud(baud_rate, baud_rate)
    }

    /// A device running at `device_baud` while the host line starts at `host_baud`.
    pub fn at_baud(device_baud: u32, host_baud: u32) -> Self {
        Self {
            inbound: VecDeque::new(),
            parser: Reassembler::new(),
            commands: Vec::new(),
            host_baud,
            device_baud,
            chunk_size: usize::MAX,
            silent: false,
            nacks: HashMap::new(),
            reply_fields: HashMap::new(),
            read_error: None,
            reconfigurations: Vec::new(),
        }
    }

    /// Deliver at most `chunk_size` bytes per read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Never answer commands.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Answer `descriptor`/`field` commands with NACK `code`.
    pub fn nack(mut self, descriptor: u8, field: u8, code: u8) -> Self {
        self.nacks.insert((descriptor, field), code);
        self
    }

    /// Append a `reply_descriptor` field carrying `data` to the ACK of
    /// `descriptor`/`field` commands.
    pub fn reply_field(mut self, descriptor: u8, field: u8, reply_descriptor: u8, data: &[u8]) -> Self {
        self.reply_fields
            .entry((descriptor, field))
            .or_default()
            .push((reply_descriptor, data.to_vec()));
        self
    }

    /// Fail every read with an I/O error of `kind`.
    pub fn fail_reads(mut self, kind: io::ErrorKind) -> Self {
        self.read_error = Some(kind);
        self
    }

    /// Queue an unsolicited frame, as if streamed by the device.
    pub fn queue_frame(&mut self, descriptor: u8, payload: &[u8]) {
        if let Ok(wire) = encode(descriptor, payload) {
            self.inbound.extend(wire.iter().copied());
        }
    }

    /// Queue raw bytes on the line.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Commands the device received and understood, in order.
    pub fn commands(&self) -> &[Frame] {
        &self.commands
    }

    pub fn device_baud(&self) -> u32 {
        self.device_baud
    }

    /// Every rate the host line was switched to.
    pub fn reconfigurations(&self) -> &[u32] {
        &self.reconfigurations
    }

    /// Bytes queued for the host and not read yet.
    pub fn pending_bytes(&self) -> usize {
        self.inbound.len()
    }

    fn respond(&mut self, command: Frame) {
        let descriptor = command.descriptor;
        let field = command.payload.get(1).copied().unwrap_or(0);
        let code = self.nacks.get(&(descriptor, field)).copied().unwrap_or(0);

        let mut reply = PayloadBuilder::new().field(ACK_FIELD, &[field, code]);
        if code == 0 {
            for (reply_descriptor, data) in self.reply_fields.get(&(descriptor, field)).into_iter().flatten() {
                reply = reply.and_then(|builder| builder.field(*reply_descriptor, data));
            }
        }
        if let Ok(payload) = reply {
            self.queue_frame(descriptor, &payload.finish());
        }

        if code == 0 && descriptor == DEVICE_COMMAND && field == device::UART_BAUD_RATE {
            if let Some(raw) = command.payload.get(3..7) {
                self.device_baud = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            }
        }
        self.commands.push(command);
    }
}

impl ByteTransport for SimulatedDevice {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(TransportError::Io(io::Error::new(kind, "simulated read failure")));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.inbound.is_empty() {
            std::thread::sleep(timeout.min(IDLE_READ));
            return Err(TransportError::Timeout {
                direction: Direction::Read,
                timeout,
            });
        }
        let n = buf.len().min(self.chunk_size).min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
        if self.host_baud == self.device_baud && !self.silent {
            for command in self.parser.feed(bytes) {
                self.respond(command);
            }
        }
        Ok(bytes.len())
    }

    fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        self.host_baud = baud_rate;
        self.reconfigurations.push(baud_rate);
        self.inbound.clear();
        self.parser.reset();
        Ok(())
    }

    fn baud_rate(&self) -> Option<u32> {
        Some(self.host_baud)
    }

    fn transport_name(&self) -> &'static str {
        "simulated"
    }
}
