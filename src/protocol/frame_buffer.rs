//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForLength`: scanning for the `:` that ends the length prefix
//! - `WaitingForPayload`: length parsed, need N payload bytes
//!
//! # Example
//!
//! ```
//! use arnelify_uds::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // A frame split across two socket reads
//! assert!(buffer.push(b"7:{\"a\"").unwrap().is_empty());
//! let frames = buffer.push(b":1}").unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), b"{\"a\":1}");
//! ```

use bytes::BytesMut;

use super::wire_format::{find_delimiter, parse_length, DEFAULT_MAX_PAYLOAD_SIZE};
use super::Frame;
use crate::error::Result;

/// Default initial buffer capacity (64 KB).
const DEFAULT_CAPACITY: usize = 64 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// No length pending, the buffer starts with a length prefix.
    WaitingForLength,
    /// Prefix consumed, waiting for `length` payload bytes.
    WaitingForPayload { length: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// One instance per connection. Frames are removed from the front as they
/// complete; nothing else ever resets the buffer.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max payload: 1GB.
    pub fn new() -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_CAPACITY, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_CAPACITY, max_payload_size)
    }

    /// Create a new frame buffer with custom capacity and max payload.
    pub fn with_capacity_and_max_payload(capacity: usize, max_payload_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForLength,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns zero, one or many frames. Partial data is kept for the next
    /// push.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the length prefix is malformed or the
    /// announced payload exceeds `max_payload_size`. The stream cannot be
    /// resynchronized after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();

        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a malformed prefix
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForLength => {
                let delimiter = match find_delimiter(&self.buffer)? {
                    Some(index) => index,
                    None => return Ok(None),
                };

                let length = parse_length(&self.buffer[..delimiter], self.max_payload_size)?;

                // Consume prefix and delimiter
                let _ = self.buffer.split_to(delimiter + 1);
                self.state = State::WaitingForPayload { length };

                self.try_extract_one()
            }

            State::WaitingForPayload { length } => {
                if self.buffer.len() < length {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(length).freeze();
                self.state = State::WaitingForLength;

                Ok(Some(Frame::new(payload)))
            }
        }
    }

    /// Length announced by the prefix of the frame currently being read.
    pub fn pending_length(&self) -> Option<usize> {
        match self.state {
            State::WaitingForLength => None,
            State::WaitingForPayload { length } => Some(length),
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&encode(r#"{"uuid":"1"}"#)).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text().unwrap(), r#"{"uuid":"1"}"#);
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_length(), None);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&encode(r#"{"n":1}"#));
        combined.extend_from_slice(&encode(r#"{"n":2}"#));
        combined.extend_from_slice(&encode(r#"{"n":3}"#));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].text().unwrap(), r#"{"n":1}"#);
        assert_eq!(frames[1].text().unwrap(), r#"{"n":2}"#);
        assert_eq!(frames[2].text().unwrap(), r#"{"n":3}"#);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_prefix() {
        let mut buffer = FrameBuffer::new();
        let payload = "x".repeat(120);
        let frame_bytes = encode(&format!("\"{}\"", payload));

        // "122:" split after the first digit
        assert!(buffer.push(&frame_bytes[..1]).unwrap().is_empty());
        assert_eq!(buffer.pending_length(), None);

        let frames = buffer.push(&frame_bytes[1..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 122);
    }

    #[test]
    fn test_prefix_only_then_payload() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(b"13:").unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.pending_length(), Some(13));
        assert!(buffer.is_empty());

        let frames = buffer.push(br#"{"ok":"yes"}"#).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(b" ").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text().unwrap(), r#"{"ok":"yes"} "#);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = encode(r#"{"uuid":"abc","content":{}}"#);

        let mut all_frames = Vec::new();
        for byte in frame_bytes.iter() {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(
            all_frames[0].text().unwrap(),
            r#"{"uuid":"abc","content":{}}"#
        );
    }

    #[test]
    fn test_every_split_point_reassembles() {
        let payload = r#"{"uuid":"u-1","content":{"_state":true,"path":"/"}}"#;
        let frame_bytes = encode(payload);

        for split in 0..=frame_bytes.len() {
            let mut buffer = FrameBuffer::new();
            let mut frames = buffer.push(&frame_bytes[..split]).unwrap();
            frames.extend(buffer.push(&frame_bytes[split..]).unwrap());

            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0].text().unwrap(), payload);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_multibyte_payload_split_inside_character() {
        let payload = r#"{"message":"héllo wörld ✓"}"#;
        let frame_bytes = encode(payload);
        let mut buffer = FrameBuffer::new();

        // Split in the middle of the 3-byte check mark
        let check = frame_bytes
            .windows(3)
            .position(|w| w == "✓".as_bytes())
            .unwrap();
        assert!(buffer.push(&frame_bytes[..check + 1]).unwrap().is_empty());

        let frames = buffer.push(&frame_bytes[check + 1..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text().unwrap(), payload);
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = encode(r#""first""#);
        let frame2 = encode(r#""second""#);

        let mut data = frame1.to_vec();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text().unwrap(), r#""first""#);

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text().unwrap(), r#""second""#);
    }

    #[test]
    fn test_zero_length_frame() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(b"0:").unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_malformed_prefix() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"{\"uuid\":1}").is_err());

        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b":{}").is_err());
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = FrameBuffer::with_max_payload(100);

        let result = buffer.push(b"1000:");

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();

        buffer.push(b"10:abc").unwrap();
        assert_eq!(buffer.pending_length(), Some(10));
        assert_eq!(buffer.len(), 3);

        buffer.clear();

        assert_eq!(buffer.pending_length(), None);
        assert!(buffer.is_empty());
    }
}
