//! Envelope: the JSON unit carried by each frame.
//!
//! ```text
//! { "uuid": "<correlation id>", "content": { ... } }
//! ```
//!
//! `content` is either a processing exchange (carries the `_state` marker)
//! or a notification (`{"_stdout": {"message": "...", "isError": false}}`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::Frame;
use crate::error::{Result, UdsError};

/// Marker field identifying a processing exchange.
pub const STATE_MARKER: &str = "_state";

/// Field carrying a notification.
pub const STDOUT_FIELD: &str = "_stdout";

/// A validated envelope.
///
/// The `uuid` is echoed back unchanged in the reply. No correlation table is
/// kept: each connection runs one exchange at a time, so replies are matched
/// by ordering alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id chosen by the initiating peer.
    pub uuid: String,
    /// Exchange payload.
    pub content: Value,
    /// Any other top-level fields. Carried over unchanged into the reply.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a `_stdout` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdoutContent {
    pub message: String,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// What an envelope's content asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    /// A request to be handed to the handler.
    State,
    /// A one-way log line.
    Stdout(StdoutContent),
    /// Anything else.
    Unknown,
}

impl Envelope {
    /// Create an envelope with a freshly generated uuid.
    pub fn new(content: Value) -> Self {
        Self::with_uuid(generate_uuid(), content)
    }

    /// Create an envelope with an explicit uuid.
    pub fn with_uuid(uuid: impl Into<String>, content: Value) -> Self {
        Self {
            uuid: uuid.into(),
            content,
            extra: Map::new(),
        }
    }

    /// Replace the content, keeping the uuid and any other fields.
    pub fn reply(self, content: Value) -> Self {
        Self { content, ..self }
    }

    /// Build a `_stdout` notification envelope.
    pub fn stdout(message: impl Into<String>, is_error: bool) -> Self {
        let message: String = message.into();
        let mut content = Map::new();
        content.insert(
            STDOUT_FIELD.to_string(),
            json!({ "message": message, "isError": is_error }),
        );
        Self::new(Value::Object(content))
    }

    /// Decode and validate an envelope from a frame.
    pub fn decode(frame: &Frame) -> Result<Self> {
        let value: Value = frame.json()?;
        Self::from_value(value)
    }

    /// Validate a parsed JSON value as an envelope.
    ///
    /// Both `uuid` (a non-empty string) and `content` (an object) must be
    /// present. Remaining keys are kept in `extra`.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(object) => object,
            _ => return Err(missing_fields()),
        };

        let uuid = match object.remove("uuid") {
            Some(Value::String(uuid)) if !uuid.is_empty() => uuid,
            _ => return Err(missing_fields()),
        };

        let content = match object.remove("content") {
            Some(content @ Value::Object(_)) => content,
            _ => return Err(missing_fields()),
        };

        Ok(Self {
            uuid,
            content,
            extra: object,
        })
    }

    /// Classify the content.
    ///
    /// `_state` wins over `_stdout` when both are present. A `_stdout` field
    /// that does not have the notification shape is treated as unknown.
    pub fn kind(&self) -> ContentKind {
        if self.content.get(STATE_MARKER).is_some_and(is_set) {
            return ContentKind::State;
        }

        match self.content.get(STDOUT_FIELD) {
            Some(stdout) if is_set(stdout) => {
                match StdoutContent::deserialize(stdout) {
                    Ok(notification) => ContentKind::Stdout(notification),
                    Err(_) => ContentKind::Unknown,
                }
            }
            _ => ContentKind::Unknown,
        }
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn missing_fields() -> UdsError {
    UdsError::Envelope("The 'uuid' or 'content' is missing in the message.".to_string())
}

fn is_set(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Generate a 32 hex digit correlation id.
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
