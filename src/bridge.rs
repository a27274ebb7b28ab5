//! Assembly of a bridge session.
//!
//! [`BridgeBuilder`] collects the configuration, the application handler and
//! the log sink, then produces a running [`Connector`] or [`Listener`]:
//! 1. Build the dispatcher around the handler
//! 2. Connect to (or bind) the socket path
//! 3. Serve frames until the peer goes away
//!
//! # Example
//!
//! ```ignore
//! use arnelify_uds::{BridgeBuilder, Response};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> arnelify_uds::Result<()> {
//!     let mut bridge = BridgeBuilder::new()
//!         .socket_path("/tmp/arnelify.sock")
//!         .handler(|req: Value, mut res: Response| async move {
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

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::UdsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handler::{handler_fn, welcome_handler, Handler, HandlerResult};
use crate::response::Response;
use crate::sink::LogSink;
use crate::transport::{Connector, Listener};

/// Builder for a [`Connector`] or [`Listener`].
pub struct BridgeBuilder {
    config: UdsConfig,
    handler: Option<Box<dyn Handler>>,
    sink: Option<LogSink>,
}

impl BridgeBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: UdsConfig::default(),
            handler: None,
            sink: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: UdsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the socket path.
    ///
    /// Default: `/tmp/arnelify.sock`
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Set the read block size in kilobytes.
    ///
    /// Default: 64
    pub fn block_size_kb(mut self, kb: usize) -> Self {
        self.config.block_size_kb = kb;
        self
    }

    /// Set the first delay between checks for the peer's socket file.
    ///
    /// Default: 10 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the application handler for `_state` requests.
    ///
    /// The request content is deserialized into `T` first. Without a handler
    /// every request gets the welcome response.
    pub fn handler<F, T, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(T, Response) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(handler_fn(handler));
        self
    }

    /// Set an already boxed handler.
    pub fn boxed_handler(mut self, handler: Box<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the `(message, is_error)` callback for diagnostics and
    /// forwarded notifications.
    ///
    /// Default: [`LogSink::tracing`]
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.sink = Some(LogSink::new(logger));
        self
    }

    /// Set the log sink directly.
    pub fn sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build an unconnected [`Connector`].
    pub fn build_connector(self) -> Connector {
        let (config, dispatcher, sink) = self.into_parts();
        Connector::new(config, dispatcher, sink)
    }

    /// Build an unbound [`Listener`].
    pub fn build_listener(self) -> Listener {
        let (config, dispatcher, sink) = self.into_parts();
        Listener::new(config, dispatcher, sink)
    }

    /// Build a [`Connector`] and wait until it is connected.
    pub async fn connect(self) -> Result<Connector> {
        let mut connector = self.build_connector();
        connector.connect().await?;
        Ok(connector)
    }

    /// Build a [`Listener`] and bind its socket.
    pub async fn listen(self) -> Result<Listener> {
        let mut listener = self.build_listener();
        listener.listen().await?;
        Ok(listener)
    }

    fn into_parts(self) -> (UdsConfig, Arc<Dispatcher>, LogSink) {
        let sink = self.sink.unwrap_or_default();
        let handler = self.handler.unwrap_or_else(welcome_handler);
        let dispatcher = Arc::new(Dispatcher::new(handler, sink.clone()));
        (self.config, dispatcher, sink)
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SOCKET_PATH;
    use std::path::Path;

    #[test]
    fn test_setters_reach_config() {
        let builder = BridgeBuilder::new()
            .socket_path("/tmp/custom.sock")
            .block_size_kb(8)
            .poll_interval(Duration::from_millis(3));

        assert_eq!(builder.config.socket_path, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(builder.config.block_size(), 8 * 1024);
        assert_eq!(builder.config.poll_interval, Duration::from_millis(3));
    }

    #[test]
    fn test_config_then_override() {
        let config = UdsConfig::from_opts(&serde_json::json!({
            "SERVER_SOCKET_PATH": "/tmp/from-opts.sock"
        }));
        let connector = BridgeBuilder::new()
            .config(config)
            .block_size_kb(4)
            .build_connector();

        assert_eq!(connector.socket_path(), Path::new("/tmp/from-opts.sock"));
    }

    #[test]
    fn test_default_listener_path() {
        let listener = BridgeBuilder::default().build_listener();
        assert_eq!(listener.socket_path(), Path::new(DEFAULT_SOCKET_PATH));
        assert!(!listener.is_writable());
    }
}
