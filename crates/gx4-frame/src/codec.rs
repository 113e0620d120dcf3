use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::descriptor::descriptor_name;
use crate::error::{FrameError, Result};

/// Frame header: sync (2) + descriptor (1) + length (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Trailing checksum size.
pub const CHECKSUM_SIZE: usize = 2;

/// Sync marker: 0x75 0x65 ("ue").
pub const SYNC: [u8; 2] = [0x75, 0x65];

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD + CHECKSUM_SIZE;

/// A checksum-verified MIP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Descriptor set of this packet.
    pub descriptor: u8,
    /// The packet payload (a sequence of MIP fields for commands).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, rejecting payloads longer than 255 bytes.
    pub fn new(descriptor: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            descriptor,
            payload,
        })
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }

    /// Encode this frame into its wire representation.
    pub fn to_bytes(&self) -> Result<Bytes> {
        encode(self.descriptor, &self.payload)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "descriptor={:#04x} ({}) length={} payload=[",
            self.descriptor,
            descriptor_name(self.descriptor),
            self.payload.len()
        )?;
        for (i, byte) in self.payload.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        f.write_str("]")
    }
}

/// Fletcher-style checksum over header and payload bytes.
///
/// Accumulator A sums each byte, accumulator B sums the running A, both
/// modulo 256. The result is `(A << 8) | B`.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut a: u8 = 0;
    let mut b: u8 = 0;
    for &byte in bytes {
        a = a.wrapping_add(byte);
        b = b.wrapping_add(a);
    }
    u16::from_be_bytes([a, b])
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬──────────┬─────────────────┬──────────────┐
/// │ Sync (2B)  │ Descriptor │ Length   │ Payload         │ Checksum     │
/// │ 0x75 0x65  │ (1B)       │ (1B)     │ (Length bytes)  │ (2B BE)      │
/// └────────────┴────────────┴──────────┴─────────────────┴──────────────┘
/// ```
pub fn encode_frame(descriptor: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    let start = dst.len();
    dst.put_slice(&SYNC);
    dst.put_u8(descriptor);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    let sum = checksum(&dst[start..]);
    dst.put_u16(sum);
    Ok(())
}

/// Encode a frame into a freshly allocated, ready-to-transmit buffer.
pub fn encode(descriptor: u8, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    encode_frame(descriptor, payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode exactly one complete frame from `wire`.
///
/// Unlike the [`Reassembler`](crate::Reassembler), this is strict: leading
/// garbage, trailing bytes or a bad checksum are reported as errors.
pub fn decode_frame(wire: &[u8]) -> Result<Frame> {
    if wire.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(FrameError::Truncated {
            needed: HEADER_SIZE + CHECKSUM_SIZE,
            available: wire.len(),
        });
    }
    if wire[0..2] != SYNC {
        return Err(FrameError::InvalidSync);
    }

    let declared = wire[3] as usize;
    let actual = wire.len() - HEADER_SIZE - CHECKSUM_SIZE;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let body_end = HEADER_SIZE + declared;
    let expected = checksum(&wire[..body_end]);
    let carried = u16::from_be_bytes([wire[body_end], wire[body_end + 1]]);
    if expected != carried {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: carried,
        });
    }

    Ok(Frame {
        descriptor: wire[2],
        payload: Bytes::copy_from_slice(&wire[HEADER_SIZE..body_end]),
    })
}

/// True iff `wire` is one structurally complete frame with a matching checksum.
pub fn verify(wire: &[u8]) -> bool {
    decode_frame(wire).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_of_empty_ping_header() {
        let wire = encode(0x01, &[]).unwrap();

        assert_eq!(wire.len(), HEADER_SIZE + CHECKSUM_SIZE);
        assert_eq!(&wire[..4], &[0x75, 0x65, 0x01, 0x00]);
        assert_eq!(checksum(&[0x75, 0x65, 0x01, 0x00]), 0xDB05);
        assert_eq!(&wire[4..], &[0xDB, 0x05]);
        assert!(verify(&wire));
    }

    #[test]
    fn test_checksum_matches_reference_ping() {
        // Ping as documented for MIP devices: 75 65 01 02 02 01 E0 C6
        let wire = encode(0x01, &[0x02, 0x01]).unwrap();
        assert_eq!(wire.as_ref(), &[0x75, 0x65, 0x01, 0x02, 0x02, 0x01, 0xE0, 0xC6]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = [0x0E, 0x04, 0x3F, 0x80, 0x00, 0x00];
        let wire = encode(0x80, &payload).unwrap();

        let frame = decode_frame(&wire).unwrap();

        assert_eq!(frame.descriptor, 0x80);
        assert_eq!(frame.payload.as_ref(), &payload);
        assert_eq!(frame.wire_size(), wire.len());
        assert_eq!(frame.to_bytes().unwrap(), wire);
    }

    #[test]
    fn test_verify_holds_for_every_payload_length() {
        for len in 0..=MAX_PAYLOAD {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            let wire = encode(0x0C, &payload).unwrap();
            assert!(verify(&wire), "length {len} failed to verify");
        }
    }

    #[test]
    fn test_single_bit_flip_breaks_verify() {
        let wire = encode(0x0D, &[0x05, 0x41, 0x01, 0x00, 0x03]).unwrap();
        for index in 0..wire.len() {
            for bit in 0..8 {
                let mut corrupted = wire.to_vec();
                corrupted[index] ^= 1 << bit;
                assert!(
                    !verify(&corrupted),
                    "flipping bit {bit} of byte {index} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = encode(0x01, &payload).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadTooLarge {
                size: 256,
                max: 255
            }
        );
        assert!(Frame::new(0x01, payload).is_err());
    }

    #[test]
    fn test_decode_invalid_sync() {
        let mut wire = encode(0x01, &[]).unwrap().to_vec();
        wire[0] = 0x00;
        assert_eq!(decode_frame(&wire), Err(FrameError::InvalidSync));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut wire = encode(0x01, &[0x02, 0x01]).unwrap().to_vec();
        wire.push(0x00);
        assert!(matches!(
            decode_frame(&wire),
            Err(FrameError::LengthMismatch {
                declared: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            decode_frame(&[0x75, 0x65, 0x01]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn test_encode_appends_to_existing_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(0x01, &[0x02, 0x01], &mut buf).unwrap();
        encode_frame(0x0C, &[], &mut buf).unwrap();

        assert!(verify(&buf[..8]));
        assert!(verify(&buf[8..]));
    }

    #[test]
    fn test_display_is_hex_dump() {
        let frame = Frame::new(0x01, vec![0x02, 0x01]).unwrap();
        assert_eq!(
            frame.to_string(),
            "descriptor=0x01 (BASE_COMMAND) length=2 payload=[02 01]"
        );
    }
}
