use std::io::ErrorKind;
use std::time::{Duration, Instant};

use crate::error::{Direction, Result, TransportError};

/// A byte source and sink with per-call timeouts.
///
/// Implementations report "nothing arrived in time" as
/// [`TransportError::Timeout`], never as `Ok(0)`. A zero-length read is
/// only valid when `buf` is empty.
pub trait ByteTransport {
    /// Read whatever bytes are available, waiting at most `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write some prefix of `bytes`, waiting at most `timeout`.
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize>;

    /// Switch the local line to `baud_rate`.
    fn reconfigure(&mut self, baud_rate: u32) -> Result<()>;

    /// Currently configured baud rate, if the backend knows it.
    fn baud_rate(&self) -> Option<u32> {
        None
    }

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "byte-transport"
    }

    /// Write all of `bytes` before `timeout` elapses.
    fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut offset = 0usize;
        while offset < bytes.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout {
                    direction: Direction::Write,
                    timeout,
                });
            }
            match self.write(&bytes[offset..], remaining) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(TransportError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(bytes, timeout)
    }

    fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        (**self).reconfigure(baud_rate)
    }

    fn baud_rate(&self) -> Option<u32> {
        (**self).baud_rate()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(bytes, timeout)
    }

    fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        (**self).reconfigure(baud_rate)
    }

    fn baud_rate(&self) -> Option<u32> {
        (**self).baud_rate()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `step` bytes per write, interrupting every other call.
    struct TrickleSink {
        written: Vec<u8>,
        step: usize,
        calls: usize,
        baud: u32,
    }

    impl ByteTransport for TrickleSink {
        fn read(&mut self, _buf: &mut [u8], timeout: Duration) -> Result<usize> {
            Err(TransportError::Timeout {
                direction: Direction::Read,
                timeout,
            })
        }

        fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(TransportError::Io(std::io::Error::from(
                    ErrorKind::Interrupted,
                )));
            }
            let n = bytes.len().min(self.step);
            self.written.extend_from_slice(&bytes[..n]);
            Ok(n)
        }

        fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
            self.baud = baud_rate;
            Ok(())
        }

        fn baud_rate(&self) -> Option<u32> {
            Some(self.baud)
        }
    }

    struct ClosedSink;

    impl ByteTransport for ClosedSink {
        fn read(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            Err(TransportError::Closed)
        }

        fn write(&mut self, _bytes: &[u8], _timeout: Duration) -> Result<usize> {
            Ok(0)
        }

        fn reconfigure(&mut self, _baud_rate: u32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_all_handles_partial_and_interrupted_writes() {
        let mut sink = TrickleSink {
            written: Vec::new(),
            step: 3,
            calls: 0,
            baud: 115_200,
        };
        let bytes: Vec<u8> = (0u8..20).collect();

        sink.write_all(&bytes, Duration::from_secs(1)).unwrap();

        assert_eq!(sink.written, bytes);
    }

    #[test]
    fn write_all_reports_closed_sink() {
        let mut sink = ClosedSink;
        let err = sink.write_all(b"abc", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn write_all_with_zero_timeout_times_out() {
        let mut sink = ClosedSink;
        let err = sink.write_all(b"abc", Duration::ZERO).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn boxed_transport_forwards_calls() {
        let mut boxed: Box<dyn ByteTransport> = Box::new(TrickleSink {
            written: Vec::new(),
            step: 64,
            calls: 0,
            baud: 9600,
        });

        assert_eq!(boxed.baud_rate(), Some(9600));
        boxed.reconfigure(921_600).unwrap();
        assert_eq!(boxed.baud_rate(), Some(921_600));

        let mut buf = [0u8; 4];
        let err = boxed.read(&mut buf, Duration::from_millis(1)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(boxed.transport_name(), "byte-transport");
    }

    #[test]
    fn borrowed_transport_forwards_calls() {
        let mut sink = TrickleSink {
            written: Vec::new(),
            step: 64,
            calls: 0,
            baud: 9600,
        };
        fn greet<T: ByteTransport>(mut transport: T) {
            transport.write_all(b"hi", Duration::from_secs(1)).unwrap();
            transport.reconfigure(19_200).unwrap();
        }

        greet(&mut sink);
        assert_eq!(sink.written, b"hi");
        assert_eq!(sink.baud, 19_200);
    }
}
