//! The response writer handlers write through.
//!
//! A [`ResponseWriter`] collects status, headers and body for one request.
//! Its single write operation can be decorated once by a
//! [`WriteInterceptor`]: the first write passes through the interceptor, which
//! is consumed in the process, and every later write is a raw pass-through.
//! Because the interceptor is taken by value before it runs, it can never be
//! re-entered.

use crate::types::Response;
use bytes::Bytes;
use enforcer_core::{media, EnforcerError};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde_json::Value;
use std::fmt;

/// Response header naming the code path that produced the response.
pub const MARKER_HEADER: &str = "x-openapi-enforcer";

/// Status and headers of a response under construction.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    /// Status, `None` until a handler sets one.
    pub status: Option<StatusCode>,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Returns the `content-type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Transforms the first value written to a [`ResponseWriter`].
pub trait WriteInterceptor: Send {
    /// Transforms the head and body of the first write.
    ///
    /// # Errors
    ///
    /// An error aborts the write; nothing is written.
    fn intercept(
        self: Box<Self>,
        head: &mut ResponseHead,
        body: Option<Value>,
    ) -> Result<Option<Value>, EnforcerError>;
}

/// Collects the response for one request.
///
/// # Example
///
/// ```
/// use enforcer_chain::ResponseWriter;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let mut writer = ResponseWriter::new();
/// writer.set_status(StatusCode::CREATED);
/// writer.send(json!({ "id": 1 })).unwrap();
///
/// assert!(writer.is_sent());
/// assert_eq!(writer.header("content-type"), Some("application/json"));
/// ```
#[derive(Default)]
pub struct ResponseWriter {
    head: ResponseHead,
    body: Option<Bytes>,
    sent: bool,
    interceptor: Option<Box<dyn WriteInterceptor>>,
}

impl ResponseWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status, if set.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.head.status
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.head.status = Some(status);
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the response headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// Returns a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header.
    ///
    /// # Errors
    ///
    /// Returns a handler error when the name or value is not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), EnforcerError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EnforcerError::handler_with_source("invalid header name", e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EnforcerError::handler_with_source("invalid header value", e))?;
        self.head.headers.insert(name, value);
        Ok(())
    }

    /// Returns the written body.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns `true` once a write has completed.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Installs an interceptor for the next write, replacing any armed one.
    pub fn arm(&mut self, interceptor: Box<dyn WriteInterceptor>) {
        self.interceptor = Some(interceptor);
    }

    /// Returns `true` while an interceptor is waiting for a write.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.interceptor.is_some()
    }

    /// Removes the armed interceptor without running it.
    pub fn disarm(&mut self) {
        self.interceptor = None;
    }

    /// Sets the marker header.
    pub fn set_marker(&mut self, value: &'static str) {
        self.head.headers.insert(
            HeaderName::from_static(MARKER_HEADER),
            HeaderValue::from_static(value),
        );
    }

    /// Clears the marker header.
    pub fn clear_marker(&mut self) {
        self.head.headers.remove(MARKER_HEADER);
    }

    /// Returns the marker header value.
    #[must_use]
    pub fn marker(&self) -> Option<&str> {
        self.header(MARKER_HEADER)
    }

    /// Writes status, extra headers and body.
    ///
    /// The first call runs the armed interceptor, if any. On interceptor
    /// failure nothing is written and the error is returned so the caller can
    /// route it down the error path. Only the status the interceptor chose
    /// survives a failure; the caller's status and headers are discarded.
    ///
    /// # Errors
    ///
    /// Returns the interceptor's error.
    pub fn write(
        &mut self,
        status: Option<StatusCode>,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Result<(), EnforcerError> {
        let mut staged = self.head.clone();
        if let Some(status) = status {
            staged.status = Some(status);
        }
        for (name, value) in &headers {
            staged.headers.insert(name.clone(), value.clone());
        }

        let body = match self.interceptor.take() {
            Some(interceptor) => {
                let requested = staged.status;
                match interceptor.intercept(&mut staged, body) {
                    Ok(body) => body,
                    Err(err) => {
                        if staged.status != requested {
                            self.head.status = staged.status;
                        }
                        return Err(err);
                    }
                }
            }
            None => body,
        };
        self.head = staged;

        let encoded = match body {
            Some(value) => Some(self.encode(value)),
            None => None,
        };
        self.body = encoded;
        self.head.status.get_or_insert(StatusCode::OK);
        self.sent = true;
        Ok(())
    }

    /// Writes a body with the current status.
    ///
    /// # Errors
    ///
    /// Returns the interceptor's error.
    pub fn send(&mut self, body: impl Into<Value>) -> Result<(), EnforcerError> {
        self.write(None, HeaderMap::new(), Some(body.into()))
    }

    /// Sets the status and writes a body.
    ///
    /// # Errors
    ///
    /// Returns the interceptor's error.
    pub fn send_status(
        &mut self,
        status: StatusCode,
        body: impl Into<Value>,
    ) -> Result<(), EnforcerError> {
        self.write(Some(status), HeaderMap::new(), Some(body.into()))
    }

    /// Completes the response without a body.
    ///
    /// # Errors
    ///
    /// Returns the interceptor's error.
    pub fn end(&mut self) -> Result<(), EnforcerError> {
        self.write(None, HeaderMap::new(), None)
    }

    /// Writes a value that needs no interception.
    pub fn send_trusted(&mut self, status: StatusCode, body: Value) {
        self.disarm();
        self.head.status = Some(status);
        let encoded = self.encode(body);
        self.body = Some(encoded);
        self.sent = true;
    }

    /// Writes raw bytes without interception.
    pub fn send_bytes(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
        self.head.status.get_or_insert(StatusCode::OK);
        self.sent = true;
    }

    fn encode(&mut self, value: Value) -> Bytes {
        let content_type = self.head.content_type().map(ToString::to_string);
        match (value, content_type) {
            (Value::String(text), Some(ct)) if !media::is_json(&ct) => Bytes::from(text),
            (value, content_type) => {
                if content_type.is_none() {
                    self.head
                        .headers
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Bytes::from(serde_json::to_vec(&value).unwrap_or_default())
            }
        }
    }

    /// Converts the collected state into a response.
    ///
    /// An unset status becomes 200.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = http::Response::new(Full::new(self.body.unwrap_or_default()));
        *response.status_mut() = self.head.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.head.headers;
        response
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("head", &self.head)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("sent", &self.sent)
            .field("armed", &self.interceptor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    impl WriteInterceptor for Counting {
        fn intercept(
            self: Box<Self>,
            head: &mut ResponseHead,
            body: Option<Value>,
        ) -> Result<Option<Value>, EnforcerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            head.headers.insert("x-seen", HeaderValue::from_static("1"));
            Ok(body.map(|b| json!({ "wrapped": b })))
        }
    }

    struct Failing;

    impl WriteInterceptor for Failing {
        fn intercept(
            self: Box<Self>,
            head: &mut ResponseHead,
            _body: Option<Value>,
        ) -> Result<Option<Value>, EnforcerError> {
            head.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
            Err(EnforcerError::response_validation(None, "bad body".into()))
        }
    }

    #[test]
    fn test_interceptor_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut writer = ResponseWriter::new();
        writer.arm(Box::new(Counting(Arc::clone(&calls))));

        writer.send(json!(1)).unwrap();
        assert_eq!(writer.body().unwrap().as_ref(), br#"{"wrapped":1}"#);

        writer.send(json!(2)).unwrap();
        assert_eq!(writer.body().unwrap().as_ref(), b"2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!writer.is_armed());
    }

    #[test]
    fn test_interceptor_failure_writes_nothing() {
        let mut writer = ResponseWriter::new();
        writer.arm(Box::new(Failing));
        let err = writer.send(json!({ "id": 1 })).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!writer.is_sent());
        assert!(writer.body().is_none());
        assert_eq!(writer.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_interceptor_failure_discards_caller_head() {
        let mut writer = ResponseWriter::new();
        writer.arm(Box::new(Failing));
        let mut headers = HeaderMap::new();
        headers.insert("x-request-trace", HeaderValue::from_static("abc"));
        let err = writer
            .write(Some(StatusCode::CREATED), headers, Some(json!({ "id": 1 })))
            .unwrap_err();
        assert_eq!(err.error_code(), "RESPONSE_VALIDATION_ERROR");
        assert!(writer.header("x-request-trace").is_none());
        assert_eq!(writer.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!writer.is_sent());
    }

    #[test]
    fn test_trusted_write_skips_interceptor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut writer = ResponseWriter::new();
        writer.arm(Box::new(Counting(Arc::clone(&calls))));
        writer.send_trusted(StatusCode::ACCEPTED, json!([1, 2]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(writer.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(writer.body().unwrap().as_ref(), b"[1,2]");
    }

    #[test]
    fn test_text_bodies_are_raw() {
        let mut writer = ResponseWriter::new();
        writer.set_header("content-type", "text/plain").unwrap();
        writer.send("hello").unwrap();
        assert_eq!(writer.body().unwrap().as_ref(), b"hello");

        let mut writer = ResponseWriter::new();
        writer.send("hello").unwrap();
        assert_eq!(writer.body().unwrap().as_ref(), b"\"hello\"");
    }

    #[test]
    fn test_end_without_body() {
        let mut writer = ResponseWriter::new();
        writer.set_status(StatusCode::NO_CONTENT);
        writer.end().unwrap();
        let response = writer.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_marker() {
        let mut writer = ResponseWriter::new();
        writer.set_marker("mock");
        assert_eq!(writer.marker(), Some("mock"));
        writer.clear_marker();
        assert_eq!(writer.marker(), None);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut writer = ResponseWriter::new();
        assert!(writer.set_header("bad header", "x").is_err());
    }
}
