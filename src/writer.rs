//! Dedicated writer task per connection.
//!
//! Outbound frames go through an mpsc channel to a task that owns the write
//! half of the socket. Nothing waits for the peer to acknowledge a frame;
//! write failures are reported to the log sink after the fact.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher ─┐
//! Session     ─┴─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! ```

use std::io::{ErrorKind, IoSlice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::JsonCodec;
use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{Result, UdsError};
use crate::protocol::{encode_prefix, Envelope};
use crate::sink::LogSink;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// `<N>:` prefix.
    pub prefix: Bytes,
    /// JSON payload.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Frame a JSON text payload.
    pub fn new(payload: String) -> Self {
        Self {
            prefix: Bytes::from(encode_prefix(payload.len())),
            payload: Bytes::from(payload),
        }
    }

    /// Serialize and frame an envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Ok(Self::new(JsonCodec::encode(envelope)?))
    }

    /// Total size of this frame (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        self.prefix.len() + self.payload.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable; the dispatcher and the session share one.
#[derive(Clone)]
pub struct WriterHandle {
    /// Channel sender for frames.
    tx: mpsc::Sender<OutboundFrame>,
    /// Cleared once the socket reports it can no longer be written.
    writable: Arc<AtomicBool>,
}

impl WriterHandle {
    /// Whether frames sent now can still reach the socket.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Whether both handles feed the same writer task.
    #[inline]
    pub fn same_channel(&self, other: &WriterHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Queue a frame, waiting for channel capacity.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        if !self.is_writable() {
            return Err(UdsError::ConnectionClosed);
        }
        self.tx
            .send(frame)
            .await
            .map_err(|_| UdsError::ConnectionClosed)
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        if !self.is_writable() {
            return Err(UdsError::ConnectionClosed);
        }
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => UdsError::Io(std::io::Error::new(
                ErrorKind::WouldBlock,
                "writer queue is full",
            )),
            mpsc::error::TrySendError::Closed(_) => UdsError::ConnectionClosed,
        })
    }

    /// Serialize, frame and queue an envelope without waiting.
    pub fn write_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.try_send(OutboundFrame::from_envelope(envelope)?)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends when every handle has been dropped.
pub fn spawn_writer_task<W>(
    writer: W,
    capacity: usize,
    sink: LogSink,
) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let writable = Arc::new(AtomicBool::new(true));

    let handle = WriterHandle {
        tx,
        writable: writable.clone(),
    };

    let task = tokio::spawn(writer_loop(rx, writer, writable, sink));

    (handle, task)
}

/// Spawn the writer task with default capacity and a tracing sink.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, DEFAULT_CHANNEL_CAPACITY, LogSink::tracing())
}

/// Main writer loop - receives frames and writes them to the socket.
///
/// A failed write is reported and the loop keeps serving the queue; the
/// session is not torn down by a write error.
async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    writable: Arc<AtomicBool>,
    sink: LogSink,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                let _ = writer.shutdown().await;
                return;
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if !writable.load(Ordering::Acquire) {
            tracing::debug!("Dropping {} frame(s), socket is not writable", batch.len());
            continue;
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            if is_disconnect(&e) {
                writable.store(false, Ordering::Release);
            }
            sink.error(&format!(
                "Failed to send message to UDS (Unix Domain Socket): {}",
                e
            ));
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::WriteZero
    )
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        if slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(std::io::Error::new(
                ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }

        total_written += written;
    }

    writer.flush().await
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.prefix, &frame.payload] {
            let start = offset;
            let end = offset + part.len();

            if !part.is_empty() && skip_bytes < end {
                let start_in_part = skip_bytes.saturating_sub(start);
                slices.push(IoSlice::new(&part[start_in_part..]));
            }
            offset = end;
        }
    }

    slices
}
