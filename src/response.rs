//! Response assembly state machine.
//!
//! A handler receives a fresh [`Response`], fills it in and finalizes it with
//! [`Response::end`]. A response carries either a body or a file, never
//! both:
//!
//! ```text
//!            add_body            end
//!   Empty ─────────────► HasBody ─────┐
//!     │                               ▼
//!     └──────────────► HasFile ────► Ended
//!          set_file             end
//! ```
//!
//! Every illegal transition returns a [`ResponseError`] and leaves the
//! response untouched.
//!
//! # Example
//!
//! ```
//! use arnelify_uds::Response;
//!
//! let mut res = Response::new();
//! res.set_code(201);
//! res.set_header("Content-Type", "application/json");
//! res.add_body("{\"id\":").unwrap();
//! res.add_body("7}").unwrap();
//! res.end().unwrap();
//!
//! assert_eq!(res.body(), "{\"id\":7}");
//! assert!(res.is_ended());
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Contract violations while building a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// `add_body` on a response that already carries a file.
    #[error("Can't add body to a Response that contains a file.")]
    BodyWithFile,

    /// `set_file` on a response that already carries a body.
    #[error("Can't add an attachment to a Response that contains a body.")]
    FileWithBody,

    /// `set_file` with an empty path.
    #[error("Can't attach a file with an empty path to a Response.")]
    EmptyFilePath,

    /// `end` on a response with neither body nor file.
    #[error("Can't end a Response that has neither a body nor a file.")]
    EndWithoutContent,

    /// Mutation of the content after `end`.
    #[error("Can't modify a Response after it has ended.")]
    AlreadyEnded,

    /// The handler returned without calling `end`.
    #[error("The handler returned a Response that was never ended.")]
    NotEnded,
}

/// Where a response is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Empty,
    HasBody,
    HasFile,
    Ended,
}

/// The reply a handler builds for one exchange.
///
/// Serializes to
/// `{"body": .., "code": .., "filePath": .., "headers": {..}, "isStatic": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    body: String,
    code: u16,
    #[serde(rename = "filePath")]
    file_path: String,
    headers: BTreeMap<String, String>,
    #[serde(rename = "isStatic")]
    is_static: bool,
    #[serde(skip)]
    state: ResponseState,
}

impl Response {
    /// Create an empty `200` response.
    pub fn new() -> Self {
        Self {
            body: String::new(),
            code: 200,
            file_path: String::new(),
            headers: BTreeMap::new(),
            is_static: false,
            state: ResponseState::Empty,
        }
    }

    /// Set the status code. Allowed in any state.
    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    /// Insert or replace a header. Allowed in any state.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    /// Append a chunk to the body.
    pub fn add_body(&mut self, chunk: &str) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::Empty | ResponseState::HasBody => {
                self.body.push_str(chunk);
                self.state = ResponseState::HasBody;
                Ok(())
            }
            ResponseState::HasFile => Err(ResponseError::BodyWithFile),
            ResponseState::Ended => Err(ResponseError::AlreadyEnded),
        }
    }

    /// Attach a file for the engine to serve. Not a static asset.
    pub fn set_file(&mut self, path: impl Into<String>) -> Result<(), ResponseError> {
        self.attach(path.into(), false)
    }

    /// Attach a static asset for the engine to serve.
    pub fn set_static_file(&mut self, path: impl Into<String>) -> Result<(), ResponseError> {
        self.attach(path.into(), true)
    }

    fn attach(&mut self, path: String, is_static: bool) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::Empty | ResponseState::HasFile => {
                if path.is_empty() {
                    return Err(ResponseError::EmptyFilePath);
                }
                self.file_path = path;
                self.is_static = is_static;
                self.state = ResponseState::HasFile;
                Ok(())
            }
            ResponseState::HasBody => Err(ResponseError::FileWithBody),
            ResponseState::Ended => Err(ResponseError::AlreadyEnded),
        }
    }

    /// Finalize the response.
    ///
    /// A file reply drops the body; a body reply drops the file fields.
    /// Ending an empty response is an error.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::HasFile => {
                self.body.clear();
            }
            ResponseState::HasBody => {
                self.file_path.clear();
                self.is_static = false;
            }
            ResponseState::Empty => return Err(ResponseError::EndWithoutContent),
            ResponseState::Ended => return Err(ResponseError::AlreadyEnded),
        }
        self.state = ResponseState::Ended;
        Ok(())
    }

    /// Serialized form of a finalized response.
    pub fn finish(&self) -> Result<Value, ResponseError> {
        if self.state != ResponseState::Ended {
            return Err(ResponseError::NotEnded);
        }
        Ok(self.to_json())
    }

    /// Current serialized form, whatever the state.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "body": self.body,
            "code": self.code,
            "filePath": self.file_path,
            "headers": self.headers,
            "isStatic": self.is_static,
        })
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == ResponseState::Ended
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let res = Response::new();

        assert_eq!(res.state(), ResponseState::Empty);
        assert_eq!(
            res.to_json(),
            json!({"body": "", "code": 200, "filePath": "", "headers": {}, "isStatic": false})
        );
    }

    #[test]
    fn test_finalize_by_file() {
        let mut res = Response::new();
        res.set_file("a.png").unwrap();
        res.end().unwrap();

        let value = res.finish().unwrap();
        assert_eq!(value["filePath"], "a.png");
        assert_eq!(value["body"], "");
        assert_eq!(value["isStatic"], false);
    }

    #[test]
    fn test_finalize_by_body() {
        let mut res = Response::new();
        res.add_body("x").unwrap();
        res.add_body("y").unwrap();
        res.end().unwrap();

        let value = res.finish().unwrap();
        assert_eq!(value["body"], "xy");
        assert_eq!(value["filePath"], "");
        assert_eq!(value["isStatic"], false);
    }

    #[test]
    fn test_body_after_file_is_rejected_without_mutation() {
        let mut res = Response::new();
        res.set_static_file("/srv/index.html").unwrap();
        let before = res.clone();

        assert_eq!(res.add_body("oops"), Err(ResponseError::BodyWithFile));
        assert_eq!(res, before);
        assert_eq!(res.state(), ResponseState::HasFile);
    }

    #[test]
    fn test_file_after_body_is_rejected_without_mutation() {
        let mut res = Response::new();
        res.add_body("hello").unwrap();
        let before = res.clone();

        assert_eq!(res.set_file("a.png"), Err(ResponseError::FileWithBody));
        assert_eq!(res, before);
        assert_eq!(res.state(), ResponseState::HasBody);
    }

    #[test]
    fn test_set_file_twice_replaces() {
        let mut res = Response::new();
        res.set_static_file("old.css").unwrap();
        res.set_file("new.css").unwrap();
        res.end().unwrap();

        assert_eq!(res.file_path(), "new.css");
        assert!(!res.is_static());
    }

    #[test]
    fn test_static_file_survives_end() {
        let mut res = Response::new();
        res.set_static_file("app.js").unwrap();
        res.end().unwrap();

        assert!(res.is_static());
        assert_eq!(res.finish().unwrap()["isStatic"], true);
    }

    #[test]
    fn test_empty_file_path_rejected() {
        let mut res = Response::new();
        assert_eq!(res.set_file(""), Err(ResponseError::EmptyFilePath));
        assert_eq!(res.state(), ResponseState::Empty);
    }

    #[test]
    fn test_end_on_empty_is_rejected() {
        let mut res = Response::new();
        assert_eq!(res.end(), Err(ResponseError::EndWithoutContent));
        assert_eq!(res.state(), ResponseState::Empty);
    }

    #[test]
    fn test_ended_is_terminal() {
        let mut res = Response::new();
        res.add_body("done").unwrap();
        res.end().unwrap();

        assert_eq!(res.add_body("more"), Err(ResponseError::AlreadyEnded));
        assert_eq!(res.set_file("a.png"), Err(ResponseError::AlreadyEnded));
        assert_eq!(res.end(), Err(ResponseError::AlreadyEnded));
        assert_eq!(res.body(), "done");
    }

    #[test]
    fn test_code_and_headers_allowed_after_end() {
        let mut res = Response::new();
        res.add_body("{}").unwrap();
        res.end().unwrap();

        res.set_code(404);
        res.set_header("X-Trace", "1");
        res.set_header("X-Trace", "2");

        assert_eq!(res.code(), 404);
        assert_eq!(res.header("X-Trace"), Some("2"));
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn test_finish_requires_end() {
        let mut res = Response::new();
        res.add_body("partial").unwrap();
        assert_eq!(res.finish(), Err(ResponseError::NotEnded));
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let mut res = Response::new();
        res.set_header("b", "2");
        res.set_header("a", "1");
        res.add_body("ok").unwrap();
        res.end().unwrap();

        assert_eq!(serde_json::to_value(&res).unwrap(), res.to_json());
        assert_eq!(
            serde_json::to_string(&res).unwrap(),
            r#"{"body":"ok","code":200,"filePath":"","headers":{"a":"1","b":"2"},"isStatic":false}"#
        );
    }
}
