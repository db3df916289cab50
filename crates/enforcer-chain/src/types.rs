//! Common types used throughout the handler chain.

use bytes::Bytes;
use enforcer_core::EnforcerError;
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;

/// The HTTP request type handled by the chain.
///
/// Bodies are buffered before dispatch so that validation and handlers can
/// both read them.
pub type Request = http::Request<Bytes>;

/// The HTTP response type produced by the chain.
pub type Response = http::Response<Full<Bytes>>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler asks the chain to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next handler.
    Next,
    /// Stop the chain; the response is complete.
    Halt,
}

/// Result returned by every handler.
///
/// `Err` routes the error to the next error handler.
pub type HandlerResult = Result<Flow, EnforcerError>;

/// Builds a JSON error response from an [`EnforcerError`].
///
/// The body is the error's [`ErrorEnvelope`](enforcer_core::ErrorEnvelope).
#[must_use]
pub fn error_response(error: &EnforcerError, request_id: Option<&str>) -> Response {
    let envelope = error.to_envelope(request_id);
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut response = http::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = error.status_code();
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}
