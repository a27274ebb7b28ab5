//! Protocol module - wire format, framing, and envelopes.
//!
//! This module implements the length-prefixed JSON protocol:
//! - `<byteLength>:<payload>` encoding
//! - Frame buffer for accumulating partial reads
//! - Envelope validation and content classification

mod envelope;
mod frame;
mod frame_buffer;
mod wire_format;

pub use envelope::{
    generate_uuid, ContentKind, Envelope, StdoutContent, STATE_MARKER, STDOUT_FIELD,
};
pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    encode, encode_prefix, find_delimiter, parse_length, DEFAULT_MAX_PAYLOAD_SIZE,
    LENGTH_DELIMITER, MAX_PREFIX_DIGITS,
};
