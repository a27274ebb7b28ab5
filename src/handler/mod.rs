//! Handler module - the application's request handling boundary.
//!
//! Provides:
//! - [`Handler`] - what the dispatcher calls for every `_state` request
//! - [`TypedHandler`] / [`handler_fn`] - adapt an async closure
//!
//! # Example
//!
//! ```
//! use arnelify_uds::handler::handler_fn;
//! use arnelify_uds::Response;
//! use serde_json::Value;
//!
//! let handler = handler_fn(|req: Value, mut res: Response| async move {
//!     res.set_header("Content-Type", "application/json");
//!     res.add_body(&req.to_string())?;
//!     res.end()?;
//!     Ok(res)
//! });
//! # let _ = handler;
//! ```

mod typed;

pub use typed::{handler_fn, welcome_handler, BoxFuture, Handler, HandlerResult, TypedHandler};
