//! A decoded frame payload.
//!
//! Uses `bytes::Bytes` so frames split off the read buffer without copying.
//!
//! # Example
//!
//! ```
//! use arnelify_uds::protocol::Frame;
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Bytes::from_static(b"{\"uuid\":\"1\"}"));
//! assert_eq!(frame.len(), 12);
//! assert_eq!(frame.text().unwrap(), "{\"uuid\":\"1\"}");
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::codec::JsonCodec;
use crate::error::{Result, UdsError};

/// One length-delimited payload taken off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes, exactly as many as the length prefix announced.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from payload bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the frame carries no payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| UdsError::Protocol(format!("Frame payload is not UTF-8: {}", e)))
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::decode(&self.payload)
    }
}
