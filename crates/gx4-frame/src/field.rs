//! MIP fields inside a frame payload.
//!
//! A payload is a sequence of `[len, descriptor, data...]` records where
//! `len` counts itself and the descriptor byte.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{Frame, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Field header: length (1) + descriptor (1).
pub const FIELD_HEADER_SIZE: usize = 2;

/// A single field borrowed from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub descriptor: u8,
    pub data: &'a [u8],
}

/// Iterator over the fields of a payload.
///
/// Yields an error once if a field header is malformed and stops there.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let len = self.rest[0] as usize;
        if len < FIELD_HEADER_SIZE || len > self.rest.len() {
            let available = self.rest.len();
            self.rest = &[];
            return Some(Err(FrameError::Truncated {
                needed: len.max(FIELD_HEADER_SIZE),
                available,
            }));
        }
        let (field, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(Ok(Field {
            descriptor: field[1],
            data: &field[FIELD_HEADER_SIZE..],
        }))
    }
}

/// Iterate over the fields of `payload`.
pub fn fields(payload: &[u8]) -> Fields<'_> {
    Fields { rest: payload }
}

/// Find the first field with `descriptor`, failing on a malformed payload.
pub fn find_field(payload: &[u8], descriptor: u8) -> Result<Option<Field<'_>>> {
    for field in fields(payload) {
        let field = field?;
        if field.descriptor == descriptor {
            return Ok(Some(field));
        }
    }
    Ok(None)
}

/// Builds a command payload out of fields.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    buf: BytesMut,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field. Fails if the payload would no longer fit a frame.
    pub fn field(mut self, descriptor: u8, data: &[u8]) -> Result<Self> {
        let len = FIELD_HEADER_SIZE + data.len();
        let total = self.buf.len() + len;
        if total > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: total,
                max: MAX_PAYLOAD,
            });
        }
        self.buf.put_u8(len as u8);
        self.buf.put_u8(descriptor);
        self.buf.put_slice(data);
        Ok(self)
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Extract the ACK/NACK code that `reply` carries for a command.
///
/// The reply must use the command's descriptor set and start with an
/// `ack_field` of at least two data bytes whose first byte echoes
/// `command_field`. When the command had no fields (`command_field` is
/// `None`) any echoed field is accepted. Returns `None` when the frame is
/// not a reply to that command.
pub fn ack_code_for(
    reply: &Frame,
    command_descriptor: u8,
    command_field: Option<u8>,
    ack_field: u8,
) -> Option<u8> {
    if reply.descriptor != command_descriptor {
        return None;
    }
    let first = fields(&reply.payload).next()?.ok()?;
    if first.descriptor != ack_field || first.data.len() < 2 {
        return None;
    }
    match command_field {
        Some(expected) if first.data[0] != expected => None,
        _ => Some(first.data[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{base, ACK_FIELD, BASE_COMMAND, DEVICE_COMMAND};

    fn ack(descriptor: u8, echoed: u8, code: u8) -> Frame {
        let payload = PayloadBuilder::new()
            .field(ACK_FIELD, &[echoed, code])
            .unwrap()
            .finish();
        Frame::new(descriptor, payload).unwrap()
    }

    #[test]
    fn iterate_multiple_fields() {
        let payload = [0x04, 0xF1, 0x03, 0x00, 0x03, 0x81, 0xAA];
        let collected: Vec<_> = fields(&payload).collect::<Result<_>>().unwrap();

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].descriptor, 0xF1);
        assert_eq!(collected[0].data, &[0x03, 0x00]);
        assert_eq!(collected[1].descriptor, 0x81);
        assert_eq!(collected[1].data, &[0xAA]);
    }

    #[test]
    fn overrunning_field_is_truncated() {
        let payload = [0x06, 0x04, 0x00];
        let mut iter = fields(&payload);
        assert!(matches!(iter.next(), Some(Err(FrameError::Truncated { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn zero_length_field_is_rejected() {
        let payload = [0x00, 0x04];
        assert!(matches!(
            fields(&payload).next(),
            Some(Err(FrameError::Truncated { .. }))
        ));
    }

    #[test]
    fn find_field_skips_others() {
        let payload = PayloadBuilder::new()
            .field(0xF1, &[0x03, 0x00])
            .unwrap()
            .field(base::DEVICE_INFO_REPLY, &[1, 2, 3])
            .unwrap()
            .finish();

        let info = find_field(&payload, base::DEVICE_INFO_REPLY)
            .unwrap()
            .unwrap();
        assert_eq!(info.data, &[1, 2, 3]);
        assert!(find_field(&payload, 0x99).unwrap().is_none());
    }

    #[test]
    fn builder_rejects_oversized_payload() {
        let big = vec![0u8; 200];
        let err = PayloadBuilder::new()
            .field(0x01, &big)
            .unwrap()
            .field(0x02, &big)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn ack_matches_command_field() {
        let reply = ack(BASE_COMMAND, base::PING, 0x00);
        assert_eq!(
            ack_code_for(&reply, BASE_COMMAND, Some(base::PING), ACK_FIELD),
            Some(0)
        );
    }

    #[test]
    fn nack_code_is_extracted() {
        let reply = ack(DEVICE_COMMAND, 0x40, 0x03);
        assert_eq!(
            ack_code_for(&reply, DEVICE_COMMAND, Some(0x40), ACK_FIELD),
            Some(3)
        );
    }

    #[test]
    fn ack_for_other_command_is_ignored() {
        let reply = ack(BASE_COMMAND, base::IDLE, 0x00);
        assert_eq!(
            ack_code_for(&reply, BASE_COMMAND, Some(base::PING), ACK_FIELD),
            None
        );
        assert_eq!(
            ack_code_for(&reply, DEVICE_COMMAND, Some(base::IDLE), ACK_FIELD),
            None
        );
    }

    #[test]
    fn empty_command_accepts_any_echo() {
        let reply = ack(BASE_COMMAND, 0x7E, 0x00);
        assert_eq!(ack_code_for(&reply, BASE_COMMAND, None, ACK_FIELD), Some(0));
    }

    #[test]
    fn data_frame_is_not_an_ack() {
        let frame = Frame::new(0x80, vec![0x0E, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(ack_code_for(&frame, 0x80, None, ACK_FIELD), None);
    }
}
