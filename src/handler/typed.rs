//! Handler trait and the typed wrapper behind closures.
//!
//! The dispatcher only knows [`Handler`]: raw `content` in, finished
//! [`Response`] out. [`TypedHandler`] adapts an async closure that wants its
//! request as a concrete type.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, UdsError};
use crate::response::Response;

/// Result type for handler functions.
///
/// The handler gives the response back once it has been ended.
pub type HandlerResult = Result<Response>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for request handlers.
///
/// Returning `Err` is fatal for the connection, whatever the error kind: the
/// request gets no reply and the read loop stops.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request. `content` is the envelope content, `_state`
    /// marker included.
    fn call(&self, content: Value, response: Response) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that deserializes the request before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, Response) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, Response) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, Response) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, content: Value, response: Response) -> BoxFuture<'static, HandlerResult> {
        let request: T = match serde_json::from_value(content) {
            Ok(v) => v,
            Err(e) => {
                let err = UdsError::Envelope(format!(
                    "Request content does not match the handler input: {}",
                    e
                ));
                return Box::pin(async move { Err(err) });
            }
        };

        let fut = (self.handler)(request, response);
        Box::pin(fut)
    }
}

/// Wrap an async closure as a boxed [`Handler`].
pub fn handler_fn<F, T, Fut>(handler: F) -> Box<dyn Handler>
where
    F: Fn(T, Response) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Box::new(TypedHandler::new(handler))
}

/// Handler installed when the application registers none.
pub fn welcome_handler() -> Box<dyn Handler> {
    handler_fn(|_request: Value, mut res: Response| async move {
        res.set_code(200);
        res.add_body(r#"{"code":200,"success":"Welcome to Arnelify Server"}"#)?;
        res.end()?;
        Ok(res)
    })
}
