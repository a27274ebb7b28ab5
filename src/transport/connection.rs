//! One live connection: a writer task plus a read loop.
//!
//! The read loop owns the connection's [`FrameBuffer`] and awaits the
//! dispatcher for every frame before reading on, so a connection never has
//! more than one exchange in flight.

use std::any::Any;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinHandle;

use crate::config::UdsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, UdsError};
use crate::protocol::FrameBuffer;
use crate::sink::LogSink;
use crate::writer::{spawn_writer_task, WriterHandle};

/// Handles to the tasks serving one stream.
pub(crate) struct Connection {
    pub(crate) writer: WriterHandle,
    reader: Option<JoinHandle<Result<()>>>,
    sink: LogSink,
    _writer_task: JoinHandle<()>,
}

impl Connection {
    /// Split the stream and start its writer task and read loop.
    pub(crate) fn spawn<S>(
        stream: S,
        config: &UdsConfig,
        dispatcher: Arc<Dispatcher>,
        sink: LogSink,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, writer_task) =
            spawn_writer_task(write_half, config.channel_capacity, sink.clone());

        let frames = FrameBuffer::with_max_payload(config.max_payload_size);
        let block_size = config.block_size();
        let loop_writer = writer.clone();
        let loop_sink = sink.clone();

        let reader = tokio::spawn(async move {
            let result = read_loop(read_half, frames, block_size, &dispatcher, &loop_writer).await;
            if let Err(e) = &result {
                report(&loop_sink, e);
            }
            result
        });

        Self {
            writer,
            reader: Some(reader),
            sink,
            _writer_task: writer_task,
        }
    }

    /// Wait for the read loop to finish.
    ///
    /// `Ok(())` when the peer closed the stream or the loop was aborted. A
    /// panic in the handler comes back as [`UdsError::HandlerPanic`].
    pub(crate) async fn join(&mut self) -> Result<()> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => return Ok(()),
        };

        match reader.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                let err = UdsError::HandlerPanic(panic_message(e.into_panic()));
                report(&self.sink, &err);
                Err(err)
            }
        }
    }

    /// Stop reading. Frames already queued for writing are still flushed.
    pub(crate) fn abort(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Read, reassemble and dispatch until the peer closes or a fatal error.
pub(crate) async fn read_loop<R>(
    mut reader: R,
    mut frames: FrameBuffer,
    block_size: usize,
    dispatcher: &Dispatcher,
    writer: &WriterHandle,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; block_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Peer closed the connection");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => return Err(UdsError::Io(e)),
        };

        for frame in frames.push(&buf[..n])? {
            if let Err(e) = dispatcher.handle(&frame, writer).await {
                if e.is_fatal() {
                    return Err(e);
                }
                dispatcher.sink().error(&format!("Error occurred: {}", e));
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn report(sink: &LogSink, err: &UdsError) {
    if err.is_fatal() {
        sink.error(&err.to_string());
    } else {
        sink.error(&format!("Error occurred: {}", err));
    }
}
