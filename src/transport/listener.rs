//! Listener: the side that owns the socket file.
//!
//! # Example
//!
//! ```ignore
//! use arnelify_uds::transport::Listener;
//!
//! let mut listener = Listener::new(config, dispatcher, sink);
//! listener.listen().await?;
//! listener.wait_for_shutdown().await?;
//! ```

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::connection::Connection;
use super::Session;
use crate::config::UdsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, UdsError};
use crate::handler::BoxFuture;
use crate::protocol::Envelope;
use crate::sink::LogSink;
use crate::writer::WriterHandle;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

type Peers = Arc<Mutex<Vec<WriterHandle>>>;

/// Server-side session over a Unix stream socket.
pub struct Listener {
    config: UdsConfig,
    dispatcher: Arc<Dispatcher>,
    sink: LogSink,
    peers: Peers,
    shutdown: Arc<watch::Sender<bool>>,
    fatal_tx: mpsc::UnboundedSender<UdsError>,
    fatal_rx: mpsc::UnboundedReceiver<UdsError>,
    accept_task: Option<JoinHandle<()>>,
    socket: Option<SocketFile>,
}

/// Stops a [`Listener`] from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop accepting. The accept loop removes its socket file on exit.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// The socket file created by one bind, identified by device and inode.
#[derive(Debug, Clone)]
struct SocketFile {
    path: PathBuf,
    dev: u64,
    ino: u64,
}

impl SocketFile {
    /// Bind `path`, replacing whatever file is there.
    fn bind(path: &Path) -> Result<(UnixListener, Self)> {
        if std::fs::symlink_metadata(path).is_ok() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let listener = UnixListener::bind(path)?;
        let meta = std::fs::symlink_metadata(path)?;
        let socket = Self {
            path: path.to_path_buf(),
            dev: meta.dev(),
            ino: meta.ino(),
        };
        Ok((listener, socket))
    }

    /// Unlink the path only if it still names the file this bind created.
    fn remove(&self) {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.dev() == self.dev && meta.ino() == self.ino => {
                let _ = std::fs::remove_file(&self.path);
            }
            _ => {}
        }
    }
}

/// Removes the socket file when dropped.
struct SocketCleanup(SocketFile);

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        self.0.remove();
    }
}

impl Listener {
    /// Create a listener that is not bound yet.
    pub fn new(config: UdsConfig, dispatcher: Arc<Dispatcher>, sink: LogSink) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            config,
            dispatcher,
            sink,
            peers: Arc::new(Mutex::new(Vec::new())),
            shutdown: Arc::new(shutdown),
            fatal_tx,
            fatal_rx,
            accept_task: None,
            socket: None,
        }
    }

    /// Socket path this listener binds.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Handle that stops this listener from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Number of connections currently being served.
    pub fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }

    /// Bind the socket path and start accepting connections.
    ///
    /// Any file already at the path is removed first. Calling it on a running
    /// listener does nothing; on a stopped one it waits for the old accept
    /// loop to exit, then binds again.
    pub async fn listen(&mut self) -> Result<()> {
        if let Some(task) = self.accept_task.take() {
            let stopping = *self.shutdown.borrow();
            if !stopping && !task.is_finished() {
                self.accept_task = Some(task);
                return Ok(());
            }
            let _ = task.await;
        }

        let (listener, socket) = match SocketFile::bind(&self.config.socket_path) {
            Ok(bound) => bound,
            Err(e) => {
                self.sink.error(&format!("Error occurred: {}", e));
                return Err(e);
            }
        };
        tracing::debug!(path = %self.config.socket_path.display(), "Listening");

        self.shutdown.send_replace(false);
        self.socket = Some(socket.clone());
        let accept = AcceptLoop {
            listener,
            cleanup: SocketCleanup(socket),
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            sink: self.sink.clone(),
            peers: self.peers.clone(),
            shutdown: self.shutdown.subscribe(),
            fatal_tx: self.fatal_tx.clone(),
        };
        self.accept_task = Some(tokio::spawn(accept.run()));
        Ok(())
    }

    /// Write to the most recently accepted live connection.
    ///
    /// Never fails: problems go to the log sink.
    pub fn write(&self, envelope: &Envelope) {
        let peer = lock(&self.peers)
            .iter()
            .rev()
            .find(|peer| peer.is_writable())
            .cloned();

        let result = match peer {
            Some(peer) => peer.write_envelope(envelope),
            None => Err(UdsError::ConnectionClosed),
        };
        if let Err(e) = result {
            self.sink.error(&format!(
                "Failed to send message to UDS (Unix Domain Socket): {}",
                e
            ));
        }
    }

    /// Whether some accepted connection can be written to.
    pub fn is_writable(&self) -> bool {
        lock(&self.peers).iter().any(WriterHandle::is_writable)
    }

    /// Stop accepting and remove the socket file.
    ///
    /// Connections already accepted keep being served until their peer
    /// closes them.
    pub fn stop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = &self.accept_task {
            task.abort();
        }
        if let Some(socket) = self.socket.take() {
            socket.remove();
        }
    }

    /// Wait for the first fatal connection error, or for the listener to stop.
    ///
    /// Returns at once when the listener was never started or is stopped.
    pub async fn wait_for_shutdown(&mut self) -> Result<()> {
        if self.accept_task.is_none() {
            return Ok(());
        }

        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            fatal = self.fatal_rx.recv() => match fatal {
                Some(e) => Err(e),
                None => Ok(()),
            },
            _ = stopped(&mut shutdown) => Ok(()),
        }
    }
}

impl Session for Listener {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.listen())
    }

    fn write(&self, envelope: &Envelope) {
        Listener::write(self, envelope)
    }

    fn is_writable(&self) -> bool {
        Listener::is_writable(self)
    }

    fn stop(&mut self) {
        Listener::stop(self)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

fn lock(peers: &Peers) -> MutexGuard<'_, Vec<WriterHandle>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

struct AcceptLoop {
    listener: UnixListener,
    cleanup: SocketCleanup,
    config: UdsConfig,
    dispatcher: Arc<Dispatcher>,
    sink: LogSink,
    peers: Peers,
    shutdown: watch::Receiver<bool>,
    fatal_tx: mpsc::UnboundedSender<UdsError>,
}

impl AcceptLoop {
    async fn run(mut self) {
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = stopped(&mut self.shutdown) => break,
            };

            match accepted {
                Ok((stream, _addr)) => {
                    tracing::debug!("Accepted connection");
                    self.serve(Connection::spawn(
                        stream,
                        &self.config,
                        self.dispatcher.clone(),
                        self.sink.clone(),
                    ));
                }
                Err(e) => {
                    self.sink.error(&format!("Error occurred: {}", e));
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        tracing::debug!(path = %self.cleanup.0.path.display(), "Stopped accepting");
    }

    /// Track the connection as a peer until its read loop ends.
    fn serve(&self, mut connection: Connection) {
        let writer = connection.writer.clone();
        lock(&self.peers).push(writer.clone());

        let peers = self.peers.clone();
        let fatal_tx = self.fatal_tx.clone();
        tokio::spawn(async move {
            let result = connection.join().await;
            lock(&peers).retain(|peer| !peer.same_channel(&writer));
            if let Err(e) = result {
                if e.is_fatal() {
                    let _ = fatal_tx.send(e);
                }
            }
        });
    }
}
