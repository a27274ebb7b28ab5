//! Envelope dispatcher.
//!
//! Decides what a decoded frame is for:
//! - `_state` content → handler, then one reply envelope on the same
//!   connection
//! - `_stdout` content → log sink, no reply
//! - anything else → dropped with a debug log

use serde_json::Value;

use crate::error::{Result, UdsError};
use crate::handler::Handler;
use crate::protocol::{ContentKind, Envelope, Frame};
use crate::response::Response;
use crate::sink::LogSink;
use crate::writer::{OutboundFrame, WriterHandle};

/// What the dispatcher did with an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The handler ran; this envelope must be written back.
    Reply(Envelope),
    /// A notification was forwarded to the log sink.
    Notified,
    /// Unrecognized content, dropped.
    Ignored,
}

/// Routes envelopes to the handler or the log sink.
///
/// Shared by every connection of a session.
pub struct Dispatcher {
    handler: Box<dyn Handler>,
    sink: LogSink,
}

impl Dispatcher {
    /// Create a dispatcher around the application handler.
    pub fn new(handler: Box<dyn Handler>, sink: LogSink) -> Self {
        Self { handler, sink }
    }

    /// The sink notifications are forwarded to.
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Decode, validate and route one frame.
    ///
    /// Awaits the handler to completion. Errors are fatal for the
    /// connection except the I/O kind.
    pub async fn dispatch(&self, frame: &Frame) -> Result<Dispatch> {
        let envelope = Envelope::decode(frame)?;

        match envelope.kind() {
            ContentKind::State => {
                let mut envelope = envelope;
                let content = std::mem::take(&mut envelope.content);
                let response = self
                    .handler
                    .call(content, Response::new())
                    .await
                    .map_err(escalate)?;
                let finished = response.finish()?;
                Ok(Dispatch::Reply(envelope.reply(finished)))
            }
            ContentKind::Stdout(notification) => {
                self.sink.emit(&notification.message, notification.is_error);
                Ok(Dispatch::Notified)
            }
            ContentKind::Unknown => {
                tracing::debug!(
                    uuid = %envelope.uuid,
                    keys = ?content_keys(&envelope.content),
                    "Ignoring envelope with unrecognized content"
                );
                Ok(Dispatch::Ignored)
            }
        }
    }

    /// Dispatch one frame and write the reply, if any, on `writer`.
    pub async fn handle(&self, frame: &Frame, writer: &WriterHandle) -> Result<()> {
        if let Dispatch::Reply(reply) = self.dispatch(frame).await? {
            let outbound = OutboundFrame::from_envelope(&reply)?;
            if let Err(e) = writer.send(outbound).await {
                self.sink.error(&format!(
                    "Failed to send message to UDS (Unix Domain Socket): {}",
                    e
                ));
            }
        }
        Ok(())
    }
}

/// Handler errors are always fatal for the connection.
fn escalate(err: UdsError) -> UdsError {
    if err.is_fatal() {
        err
    } else {
        UdsError::Handler(Box::new(err))
    }
}

fn content_keys(content: &Value) -> Vec<&str> {
    content
        .as_object()
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use serde_json::json;
    use tokio::io::{duplex, AsyncReadExt};

    use crate::handler::handler_fn;
    use crate::protocol::FrameBuffer;
    use crate::response::ResponseError;
    use crate::writer::spawn_writer_task_default;

    type Captured = Arc<Mutex<Vec<(String, bool)>>>;

    fn capture_sink() -> (LogSink, Captured) {
        let seen: Captured = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = LogSink::new(move |message, is_error| {
            captured.lock().unwrap().push((message.to_string(), is_error));
        });
        (sink, seen)
    }

    fn counting_dispatcher(sink: LogSink) -> (Dispatcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = handler_fn(move |req: Value, mut res: Response| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                res.set_header("Content-Type", "application/json");
                res.add_body(&req["path"].to_string())?;
                res.end()?;
                Ok(res)
            }
        });
        (Dispatcher::new(handler, sink), calls)
    }

    fn frame(value: Value) -> Frame {
        Frame::new(Bytes::from(value.to_string()))
    }

    #[tokio::test]
    async fn test_state_invokes_handler_once_and_replies() {
        let (sink, seen) = capture_sink();
        let (dispatcher, calls) = counting_dispatcher(sink);

        let outcome = dispatcher
            .dispatch(&frame(json!({
                "uuid": "req-1",
                "content": {"_state": true, "path": "/users"}
            })))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());

        let reply = match outcome {
            Dispatch::Reply(reply) => reply,
            other => panic!("expected reply, got {:?}", other),
        };
        assert_eq!(reply.uuid, "req-1");
        assert_eq!(
            reply.content,
            json!({
                "body": "\"/users\"",
                "code": 200,
                "filePath": "",
                "headers": {"Content-Type": "application/json"},
                "isStatic": false
            })
        );
    }

    #[tokio::test]
    async fn test_stdout_goes_to_sink_not_handler() {
        let (sink, seen) = capture_sink();
        let (dispatcher, calls) = counting_dispatcher(sink);

        let outcome = dispatcher
            .dispatch(&frame(json!({
                "uuid": "n-1",
                "content": {"_stdout": {"message": "Server started on port 3001", "isError": false}}
            })))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Notified);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("Server started on port 3001".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_unknown_content_is_ignored() {
        let (sink, seen) = capture_sink();
        let (dispatcher, calls) = counting_dispatcher(sink);

        let outcome = dispatcher
            .dispatch(&frame(json!({"uuid": "x", "content": {"_future": 1}})))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Ignored);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_uuid_is_fatal() {
        let (dispatcher, calls) = counting_dispatcher(LogSink::noop());

        let err = dispatcher
            .dispatch(&frame(json!({"content": {"_state": true}})))
            .await
            .unwrap_err();

        assert!(matches!(err, UdsError::Envelope(_)));
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_is_fatal() {
        let (dispatcher, _) = counting_dispatcher(LogSink::noop());

        let err = dispatcher
            .dispatch(&Frame::new(Bytes::from_static(b"{not json")))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unended_response_is_usage_error() {
        let handler = handler_fn(|_req: Value, mut res: Response| async move {
            res.add_body("forgot to end")?;
            Ok(res)
        });
        let dispatcher = Dispatcher::new(handler, LogSink::noop());

        let err = dispatcher
            .dispatch(&frame(json!({"uuid": "1", "content": {"_state": true}})))
            .await
            .unwrap_err();

        assert!(matches!(err, UdsError::Usage(ResponseError::NotEnded)));
    }

    #[tokio::test]
    async fn test_non_fatal_handler_error_becomes_fatal() {
        let handler = handler_fn(|_req: Value, _res: Response| async move {
            Err::<Response, _>(UdsError::ConnectionClosed)
        });
        let dispatcher = Dispatcher::new(handler, LogSink::noop());

        let err = dispatcher
            .dispatch(&frame(json!({"uuid": "1", "content": {"_state": true}})))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, UdsError::Handler(ref cause) if matches!(**cause, UdsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_reply_keeps_extra_fields() {
        let (dispatcher, _) = counting_dispatcher(LogSink::noop());

        let outcome = dispatcher
            .dispatch(&frame(json!({
                "uuid": "req-2",
                "content": {"_state": true, "path": "/"},
                "route": "api"
            })))
            .await
            .unwrap();

        match outcome {
            Dispatch::Reply(reply) => {
                assert_eq!(reply.uuid, "req-2");
                assert_eq!(reply.extra["route"], "api");
                assert_eq!(reply.content["code"], 200);
            }
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_writes_single_reply() {
        let (dispatcher, _) = counting_dispatcher(LogSink::noop());
        let (client, mut server) = duplex(4096);
        let (writer, _task) = spawn_writer_task_default(client);

        dispatcher
            .handle(
                &frame(json!({"uuid": "abc", "content": {"_state": 1, "path": "/"}})),
                &writer,
            )
            .await
            .unwrap();
        dispatcher
            .handle(
                &frame(json!({"uuid": "n", "content": {"_stdout": {"message": "m"}}})),
                &writer,
            )
            .await
            .unwrap();
        drop(writer);

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();

        let frames = FrameBuffer::new().push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        let reply = Envelope::decode(&frames[0]).unwrap();
        assert_eq!(reply.uuid, "abc");
        assert_eq!(reply.content["body"], "\"/\"");
    }
}
