//! Error types for arnelify-uds.

use thiserror::Error;

use crate::response::ResponseError;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum UdsError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame payload that is not valid JSON.
    #[error("Message from UDS (Unix Domain Socket) must be in valid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    /// Framing error (malformed length prefix, oversized frame, invalid UTF-8).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Envelope failed validation (missing uuid or content).
    #[error("Envelope error: {0}")]
    Envelope(String),

    /// The handler misused its response.
    #[error(transparent)]
    Usage(#[from] ResponseError),

    /// The handler returned an error instead of an ended response.
    #[error("Handler failed: {0}")]
    Handler(Box<UdsError>),

    /// The handler panicked while serving a request.
    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    /// Connection closed or not yet established.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl UdsError {
    /// Whether this error leaves the channel in an unrecoverable state.
    ///
    /// Framing, envelope, response usage and handler failures are fatal: the
    /// stream can no longer be trusted or an exchange would go unanswered.
    /// Transport errors are reported and the session keeps going.
    pub fn is_fatal(&self) -> bool {
        match self {
            UdsError::Json(_)
            | UdsError::Protocol(_)
            | UdsError::Envelope(_)
            | UdsError::Usage(_)
            | UdsError::Handler(_)
            | UdsError::HandlerPanic(_) => true,
            UdsError::Io(_) | UdsError::ConnectionClosed => false,
        }
    }
}

/// Result type alias using UdsError.
pub type Result<T> = std::result::Result<T, UdsError>;
