//! Log sink handed to every component at construction.
//!
//! The sink is the boundary towards the console/CLI layer: it receives
//! transport errors, fatal diagnostics and the `_stdout` notifications the
//! engine forwards. Components never pick a sink themselves; the builder
//! defaults to [`LogSink::tracing`].

use std::fmt;
use std::sync::Arc;

type SinkFn = dyn Fn(&str, bool) + Send + Sync;

/// Cloneable `(message, is_error)` callback.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<SinkFn>,
}

impl LogSink {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Route messages to `tracing`: errors at `error`, the rest at `info`.
    pub fn tracing() -> Self {
        Self::new(|message, is_error| {
            if is_error {
                tracing::error!(target: "arnelify_uds", "{}", message);
            } else {
                tracing::info!(target: "arnelify_uds", "{}", message);
            }
        })
    }

    /// Discard everything.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    /// Deliver a message.
    #[inline]
    pub fn emit(&self, message: &str, is_error: bool) {
        (self.inner)(message, is_error)
    }

    /// Deliver an error message.
    #[inline]
    pub fn error(&self, message: &str) {
        self.emit(message, true)
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = LogSink::new(move |message, is_error| {
            captured.lock().unwrap().push((message.to_string(), is_error));
        });

        sink.emit("started", false);
        sink.clone().error("broken pipe");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("started".to_string(), false),
                ("broken pipe".to_string(), true)
            ]
        );
    }

    #[test]
    fn test_builtin_sinks_do_not_panic() {
        LogSink::noop().emit("ignored", true);
        LogSink::tracing().emit("no subscriber installed", false);
        LogSink::default().error("still fine");
    }
}
