//! Wire format encoding and decoding.
//!
//! Every frame is an ASCII decimal byte count, a colon, then exactly that
//! many bytes of UTF-8 JSON:
//! ```text
//! ┌──────────────┬─────┬──────────────────────┐
//! │ Length       │ ':' │ Payload              │
//! │ 1..20 digits │     │ <Length> bytes UTF-8 │
//! └──────────────┴─────┴──────────────────────┘
//! ```
//!
//! There is no trailer and no other delimiter between frames.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, UdsError};

/// Separator between the length prefix and the payload.
pub const LENGTH_DELIMITER: u8 = b':';

/// Longest accepted length prefix (enough digits for `u64::MAX`).
pub const MAX_PREFIX_DIGITS: usize = 20;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1_073_741_824;

/// Encode the length prefix for a payload of `payload_len` bytes.
///
/// # Example
///
/// ```
/// use arnelify_uds::protocol::encode_prefix;
///
/// assert_eq!(encode_prefix(17), b"17:".to_vec());
/// ```
pub fn encode_prefix(payload_len: usize) -> Vec<u8> {
    let mut prefix = payload_len.to_string().into_bytes();
    prefix.push(LENGTH_DELIMITER);
    prefix
}

/// Encode a payload into a complete frame.
///
/// The prefix counts UTF-8 bytes, not characters, so the peer's decoder
/// stays in sync for non-ASCII payloads.
///
/// # Example
///
/// ```
/// use arnelify_uds::protocol::encode;
///
/// assert_eq!(&encode("{\"a\":\"é\"}")[..], "10:{\"a\":\"é\"}".as_bytes());
/// ```
pub fn encode(payload: &str) -> Bytes {
    let prefix = encode_prefix(payload.len());
    let mut buf = BytesMut::with_capacity(prefix.len() + payload.len());
    buf.put_slice(&prefix);
    buf.put_slice(payload.as_bytes());
    buf.freeze()
}

/// Find the delimiter that ends the length prefix at the front of `buf`.
///
/// Returns `Ok(None)` while the prefix may still be incomplete. Fails fast
/// when the bytes seen so far can never form a valid prefix.
pub fn find_delimiter(buf: &[u8]) -> Result<Option<usize>> {
    for (i, &byte) in buf.iter().enumerate() {
        if byte == LENGTH_DELIMITER {
            return Ok(Some(i));
        }
        if !byte.is_ascii_digit() {
            return Err(UdsError::Protocol(format!(
                "Invalid byte 0x{:02x} in length prefix",
                byte
            )));
        }
        if i >= MAX_PREFIX_DIGITS {
            return Err(UdsError::Protocol(format!(
                "Length prefix exceeds {} digits",
                MAX_PREFIX_DIGITS
            )));
        }
    }
    Ok(None)
}

/// Parse the digits of a length prefix (without the delimiter).
pub fn parse_length(digits: &[u8], max_payload_size: usize) -> Result<usize> {
    if digits.is_empty() {
        return Err(UdsError::Protocol("Empty length prefix".to_string()));
    }

    let text = std::str::from_utf8(digits)
        .map_err(|_| UdsError::Protocol("Length prefix is not ASCII".to_string()))?;
    let length: usize = text
        .parse()
        .map_err(|_| UdsError::Protocol(format!("Malformed length prefix: {:?}", text)))?;

    if length > max_payload_size {
        return Err(UdsError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            length, max_payload_size
        )));
    }

    Ok(length)
}
