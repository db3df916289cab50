//! The per-request state handlers operate on.

use crate::types::Request;
use crate::writer::ResponseWriter;
use enforcer_core::RequestContext;

/// One request, its response under construction, and its context.
#[derive(Debug)]
pub struct Exchange {
    /// The incoming request.
    pub request: Request,
    /// The response writer.
    pub response: ResponseWriter,
    /// Per-request state.
    pub context: RequestContext,
}

impl Exchange {
    /// Creates an exchange with an empty response and a fresh context.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
            context: RequestContext::new(),
        }
    }

    /// Returns a request header as a string.
    #[must_use]
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }
}
