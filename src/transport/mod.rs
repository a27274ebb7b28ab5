//! Transport module - Unix domain socket sessions.
//!
//! Provides:
//! - [`Connector`] - dials a socket file owned by the peer
//! - [`Listener`] - owns the socket file and accepts connections
//!
//! Both run the same per-connection read loop and writer task.

mod connection;
mod connector;
mod listener;

pub use connector::Connector;
pub use listener::{Listener, ShutdownHandle};

use crate::error::Result;
use crate::handler::BoxFuture;
use crate::protocol::Envelope;

/// Operations shared by both ends of the bridge.
pub trait Session: Send {
    /// Connect (connector) or bind and start accepting (listener).
    fn start(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Frame and queue an envelope. Failures go to the log sink.
    fn write(&self, envelope: &Envelope);

    /// Whether a write issued now would be attempted.
    fn is_writable(&self) -> bool;

    /// Stop the session.
    fn stop(&mut self);
}
