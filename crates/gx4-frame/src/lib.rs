//! MIP packet framing for serial-attached inertial sensors.
//!
//! Every packet on the wire is framed with:
//! - A 2-byte sync marker (`0x75 0x65`)
//! - A 1-byte descriptor set (message category)
//! - A 1-byte payload length
//! - Up to 255 payload bytes, itself a sequence of MIP fields
//! - A 2-byte big-endian Fletcher checksum
//!
//! The [`Reassembler`] turns an arbitrarily chunked byte stream into
//! checksum-verified frames and resynchronises after corruption.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod reassembler;

pub use codec::{
    checksum, decode_frame, encode, encode_frame, verify, Frame, CHECKSUM_SIZE, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD, SYNC,
};
pub use descriptor::{descriptor_name, DescriptorTable, FrameKind};
pub use error::{FrameError, Result};
pub use field::{ack_code_for, fields, find_field, Field, Fields, PayloadBuilder};
pub use reassembler::{Reassembler, ReassemblerStats};
