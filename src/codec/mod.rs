//! Codec module - serialization/deserialization for frame payloads.
//!
//! - [`JsonCodec`] - compact JSON via `serde_json`
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather than trait objects.

mod json;

pub use json::JsonCodec;
