//! # arnelify-uds
//!
//! Unix domain socket bridge between an Arnelify server engine and the
//! application code that answers its requests.
//!
//! ## Architecture
//!
//! - **Wire format**: `<byteLength>:<json>` frames, reassembled from arbitrary
//!   stream chunks by [`protocol::FrameBuffer`]
//! - **Envelopes**: `{"uuid": .., "content": {..}}`; content marked `_state` is
//!   a request for the handler, content carrying `_stdout` is a log line
//! - **Sessions**: [`Connector`] dials the engine's socket, [`Listener`] owns
//!   the socket and accepts the engine
//!
//! ## Example
//!
//! ```ignore
//! use arnelify_uds::{BridgeBuilder, Response};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> arnelify_uds::Result<()> {
//!     let mut bridge = BridgeBuilder::new()
//!         .handler(|req: Value, mut res: Response| async move {
//!             res.set_header("Content-Type", "application/json");
//!             res.add_body(&req.to_string())?;
//!             res.end()?;
//!             Ok(res)
//!         })
//!         .connect()
//!         .await?;
//!
//!     bridge.wait_for_shutdown().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod response;
pub mod sink;
#[cfg(unix)]
pub mod transport;
pub mod writer;

#[cfg(unix)]
mod bridge;

#[cfg(unix)]
pub use bridge::BridgeBuilder;
pub use config::UdsConfig;
pub use error::{Result, UdsError};
pub use protocol::Envelope;
pub use response::{Response, ResponseError};
pub use sink::LogSink;
#[cfg(unix)]
pub use transport::{Connector, Listener, Session};
