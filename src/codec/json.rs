//! JSON codec using `serde_json`.
//!
//! Payloads are compact JSON text (no indentation), which is what the
//! engine's reader expects inside a frame.
//!
//! # Example
//!
//! ```
//! use arnelify_uds::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = JsonCodec::encode(&msg).unwrap();
//! assert_eq!(encoded, r#"{"id":42,"content":"hello"}"#);
//!
//! let frame = JsonCodec::encode_frame(&msg).unwrap();
//! assert!(frame.starts_with(b"27:"));
//!
//! let decoded: Message = JsonCodec::decode(encoded.as_bytes()).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use bytes::Bytes;

use crate::error::{Result, UdsError};
use crate::protocol::encode;

/// JSON codec for frame payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Encode a value straight into a length-prefixed frame.
    pub fn encode_frame<T: serde::Serialize>(value: &T) -> Result<Bytes> {
        Ok(encode(&Self::encode(value)?))
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the bytes are not UTF-8, or a JSON error
    /// if they are not valid JSON for type T. Both are fatal.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| UdsError::Protocol(format!("Frame payload is not UTF-8: {}", e)))?;
        Ok(serde_json::from_str(text)?)
    }
}
