use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use gx4_frame::descriptor::is_command_set;
use gx4_frame::{
    ack_code_for, encode, DescriptorTable, Frame, FrameKind, Reassembler, ReassemblerStats,
};
use gx4_transport::{ByteTransport, TransportError};
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};
use crate::observer::{FilterObserver, ImuObserver};
use crate::telemetry::{decode_filter, decode_imu, TelemetryLayout};

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reply deadline used by callers that do not pass their own.
    pub command_timeout: Duration,
    /// Deadline for transmitting one command frame.
    pub write_timeout: Duration,
    /// Size of the buffer handed to each transport read.
    pub read_chunk_size: usize,
    /// Descriptor values used to classify incoming frames.
    pub descriptors: DescriptorTable,
    /// Payload layout of telemetry frames.
    pub layout: TelemetryLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            read_chunk_size: 1024,
            descriptors: DescriptorTable::default(),
            layout: TelemetryLayout::default(),
        }
    }
}

/// Telemetry and routing counters kept by a [`Session`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// IMU records decoded.
    pub imu_records: u64,
    /// Filter records decoded.
    pub filter_records: u64,
    /// Telemetry frames discarded because the payload did not decode.
    pub malformed_records: u64,
    /// Replies on a command set that matched no pending command.
    pub stray_replies: u64,
    /// Valid frames on any other descriptor set.
    pub unmatched_frames: u64,
}

/// The single outstanding command.
#[derive(Debug)]
struct PendingCommand {
    descriptor: u8,
    /// First field descriptor of the command payload, echoed by the ACK.
    field: Option<u8>,
    timeout: Duration,
    deadline: Instant,
    /// Matching reply and its ACK code, once seen.
    reply: Option<(Frame, u8)>,
}

/// A command/response session over a byte transport.
///
/// At most one command is outstanding at a time. Telemetry frames that
/// arrive while a reply is awaited are decoded and delivered to the
/// observers in arrival order; the awaited reply always takes precedence
/// over telemetry classification.
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    reassembler: Reassembler,
    pending: Option<PendingCommand>,
    imu_observer: Option<Weak<dyn ImuObserver>>,
    filter_observer: Option<Weak<dyn FilterObserver>>,
    read_buf: Vec<u8>,
    stats: SessionStats,
}

impl<T: ByteTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        let read_buf = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            transport,
            config,
            reassembler: Reassembler::new(),
            pending: None,
            imu_observer: None,
            filter_observer: None,
            read_buf,
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transmit a command and register it as the pending command.
    ///
    /// Fails with [`SessionError::AlreadyPending`] while another command
    /// awaits its reply. Nothing is written in that case.
    pub fn start_command(&mut self, descriptor: u8, payload: &[u8], timeout: Duration) -> Result<()> {
        if let Some(pending) = &self.pending {
            return Err(SessionError::AlreadyPending {
                descriptor: pending.descriptor,
            });
        }

        let wire = encode(descriptor, payload)?;
        self.transport.write_all(&wire, self.config.write_timeout)?;

        let field = payload.get(1).copied();
        trace!(descriptor, ?field, len = payload.len(), "command sent");
        self.pending = Some(PendingCommand {
            descriptor,
            field,
            timeout,
            deadline: Instant::now() + timeout,
            reply: None,
        });
        Ok(())
    }

    /// Block until the pending command's reply arrives or its deadline passes.
    ///
    /// Returns the reply frame on ACK. A NACK becomes
    /// [`SessionError::Command`]. The pending command is cleared in every
    /// outcome except [`SessionError::NotPending`].
    pub fn wait_reply(&mut self) -> Result<Frame> {
        loop {
            if let Some(result) = self.take_reply() {
                return result;
            }
            let Some(pending) = &self.pending else {
                return Err(SessionError::NotPending);
            };

            let remaining = pending.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let (descriptor, timeout) = (pending.descriptor, pending.timeout);
                self.pending = None;
                debug!(descriptor, ?timeout, "command timed out");
                return Err(SessionError::Timeout { descriptor, timeout });
            }

            match self.poll(remaining) {
                Ok(_) => {}
                Err(err) if err.is_timeout() => {}
                Err(err) => {
                    self.pending = None;
                    return Err(SessionError::Io(err));
                }
            }
        }
    }

    /// Send a command and wait for its reply.
    pub fn send_command(&mut self, descriptor: u8, payload: &[u8], timeout: Duration) -> Result<Frame> {
        self.start_command(descriptor, payload, timeout)?;
        self.wait_reply()
    }

    /// Poll the transport once and dispatch every frame that completes.
    ///
    /// Returns the number of telemetry records delivered to observers. A
    /// reply to the pending command is stored for [`wait_reply`](Self::wait_reply).
    /// Nothing arriving within `timeout` is not an error.
    pub fn run_once(&mut self, timeout: Duration) -> Result<usize> {
        match self.poll(timeout) {
            Ok(delivered) => Ok(delivered),
            Err(err) if err.is_timeout() => Ok(0),
            Err(err) => Err(SessionError::Io(err)),
        }
    }

    /// True while a command awaits its reply.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Register the IMU observer, replacing any previous one.
    ///
    /// Only a weak handle is kept; dropping the `Arc` unregisters it.
    pub fn set_imu_observer<O: ImuObserver + 'static>(&mut self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn ImuObserver> = weak;
        self.imu_observer = Some(weak);
    }

    pub fn clear_imu_observer(&mut self) {
        self.imu_observer = None;
    }

    /// Register the filter observer, replacing any previous one.
    pub fn set_filter_observer<O: FilterObserver + 'static>(&mut self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn FilterObserver> = weak;
        self.filter_observer = Some(weak);
    }

    pub fn clear_filter_observer(&mut self) {
        self.filter_observer = None;
    }

    /// Switch the local line rate and drop any partially received frame.
    pub fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        if let Some(pending) = &self.pending {
            return Err(SessionError::AlreadyPending {
                descriptor: pending.descriptor,
            });
        }
        self.transport.reconfigure(baud_rate)?;
        self.reset_input();
        Ok(())
    }

    /// Discard buffered input bytes.
    pub fn reset_input(&mut self) {
        self.reassembler.reset();
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn reassembler_stats(&self) -> ReassemblerStats {
        self.reassembler.stats()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back, dropping any pending command.
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn take_reply(&mut self) -> Option<Result<Frame>> {
        match self.pending.take() {
            Some(PendingCommand {
                descriptor,
                field,
                reply: Some((frame, code)),
                ..
            }) => Some(if code == 0 {
                Ok(frame)
            } else {
                Err(SessionError::Command {
                    descriptor,
                    field,
                    code,
                })
            }),
            other => {
                self.pending = other;
                None
            }
        }
    }

    fn poll(&mut self, timeout: Duration) -> std::result::Result<usize, TransportError> {
        let n = self.transport.read(&mut self.read_buf, timeout)?;
        self.reassembler.push(&self.read_buf[..n]);

        let mut delivered = 0;
        while let Some(frame) = self.reassembler.next_frame() {
            if self.dispatch(frame) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Route one frame. Returns true if a telemetry record reached an observer.
    fn dispatch(&mut self, frame: Frame) -> bool {
        let ack_field = self.config.descriptors.ack_field;
        if let Some(pending) = self.pending.as_mut().filter(|p| p.reply.is_none()) {
            if let Some(code) = ack_code_for(&frame, pending.descriptor, pending.field, ack_field) {
                debug!(descriptor = pending.descriptor, code, "command reply received");
                pending.reply = Some((frame, code));
                return false;
            }
        }

        match self.config.descriptors.classify(frame.descriptor) {
            FrameKind::ImuData => self.deliver_imu(&frame),
            FrameKind::FilterData => self.deliver_filter(&frame),
            FrameKind::Other if is_command_set(frame.descriptor) => {
                self.stats.stray_replies += 1;
                debug!(%frame, "discarding reply with no matching command");
                false
            }
            FrameKind::Other => {
                self.stats.unmatched_frames += 1;
                debug!(%frame, "discarding unmatched frame");
                false
            }
        }
    }

    fn deliver_imu(&mut self, frame: &Frame) -> bool {
        let data = match decode_imu(&frame.payload, self.config.layout) {
            Ok(data) => data,
            Err(err) => {
                self.stats.malformed_records += 1;
                debug!(error = %err, "discarding malformed IMU frame");
                return false;
            }
        };
        self.stats.imu_records += 1;

        let Some(weak) = &self.imu_observer else {
            trace!("no IMU observer registered");
            return false;
        };
        match weak.upgrade() {
            Some(observer) => {
                observer.on_imu_data(&data);
                true
            }
            None => {
                warn!("IMU observer dropped, unregistering");
                self.imu_observer = None;
                false
            }
        }
    }

    fn deliver_filter(&mut self, frame: &Frame) -> bool {
        let data = match decode_filter(&frame.payload, self.config.layout) {
            Ok(data) => data,
            Err(err) => {
                self.stats.malformed_records += 1;
                debug!(error = %err, "discarding malformed filter frame");
                return false;
            }
        };
        self.stats.filter_records += 1;

        let Some(weak) = &self.filter_observer else {
            trace!("no filter observer registered");
            return false;
        };
        match weak.upgrade() {
            Some(observer) => {
                observer.on_filter_data(&data);
                true
            }
            None => {
                warn!("filter observer dropped, unregistering");
                self.filter_observer = None;
                false
            }
        }
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("reassembler", &self.reassembler)
            .field("pending", &self.pending.as_ref().map(|p| p.descriptor))
            .field("stats", &self.stats)
            .finish()
    }
}
