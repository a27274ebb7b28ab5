//! Connector: the side that does not own the socket file.
//!
//! Waits for the peer's socket file to appear, dials it once, and serves the
//! connection until the peer goes away. There is no reconnect.
//!
//! # Example
//!
//! ```ignore
//! use arnelify_uds::transport::Connector;
//!
//! let mut connector = Connector::new(config, dispatcher, sink);
//! connector.connect().await?;
//! connector.wait_for_shutdown().await?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixStream;

use super::connection::Connection;
use super::Session;
use crate::config::UdsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::handler::BoxFuture;
use crate::protocol::Envelope;
use crate::sink::LogSink;

/// Client-side session over a Unix stream socket.
pub struct Connector {
    config: UdsConfig,
    dispatcher: Arc<Dispatcher>,
    sink: LogSink,
    connection: Option<Connection>,
}

impl Connector {
    /// Create an unconnected connector.
    pub fn new(config: UdsConfig, dispatcher: Arc<Dispatcher>, sink: LogSink) -> Self {
        Self {
            config,
            dispatcher,
            sink,
            connection: None,
        }
    }

    /// Socket path this connector dials.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Wait for the socket file, then connect and start serving.
    ///
    /// Calling it again on a connected session does nothing. A refused
    /// connection is reported to the log sink and returned.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        wait_for_socket(&self.config).await;

        let stream = match UnixStream::connect(&self.config.socket_path).await {
            Ok(stream) => stream,
            Err(e) => {
                self.sink.error(&format!("Error occurred: {}", e));
                return Err(e.into());
            }
        };
        tracing::debug!(path = %self.config.socket_path.display(), "Connected to peer");

        self.connection = Some(Connection::spawn(
            stream,
            &self.config,
            self.dispatcher.clone(),
            self.sink.clone(),
        ));
        Ok(())
    }

    /// Frame and queue an envelope if the connection is writable.
    ///
    /// Never fails: problems go to the log sink.
    pub fn write(&self, envelope: &Envelope) {
        let connection = match &self.connection {
            Some(connection) if connection.writer.is_writable() => connection,
            _ => {
                tracing::debug!(uuid = %envelope.uuid, "Skipping write, socket is not writable");
                return;
            }
        };

        if let Err(e) = connection.writer.write_envelope(envelope) {
            self.sink.error(&format!(
                "Failed to send message to UDS (Unix Domain Socket): {}",
                e
            ));
        }
    }

    /// Whether a write issued now would be attempted.
    pub fn is_writable(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.writer.is_writable())
    }

    /// Stop reading from the peer and release the connection.
    pub fn stop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.abort();
        }
    }

    /// Wait until the peer closes the connection or a fatal error ends it.
    pub async fn wait_for_shutdown(&mut self) -> Result<()> {
        match self.connection.as_mut() {
            Some(connection) => connection.join().await,
            None => Ok(()),
        }
    }
}

impl Session for Connector {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.connect())
    }

    fn write(&self, envelope: &Envelope) {
        Connector::write(self, envelope)
    }

    fn is_writable(&self) -> bool {
        Connector::is_writable(self)
    }

    fn stop(&mut self) {
        Connector::stop(self)
    }
}

/// Poll until the socket path exists.
///
/// The delay starts at `poll_interval` and doubles up to `max_poll_interval`.
async fn wait_for_socket(config: &UdsConfig) {
    let mut delay: Duration = config.poll_interval;
    let mut logged = false;

    while !tokio::fs::try_exists(&config.socket_path)
        .await
        .unwrap_or(false)
    {
        if !logged {
            tracing::debug!(
                path = %config.socket_path.display(),
                "Waiting for peer socket"
            );
            logged = true;
        }
        tokio::time::sleep(delay).await;
        delay = config.next_poll_delay(delay);
    }
}
