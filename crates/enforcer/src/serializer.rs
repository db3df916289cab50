//! Contract-aware interception of the first response write.

use enforcer_chain::{ResponseHead, WriteInterceptor};
use enforcer_core::{media, EnforcerError, Operation, OperationCatalog, ResponseDraft};
use enforcer_telemetry::metrics::record_response_validation_failure;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Validates and serializes the first value a handler writes.
///
/// Armed on the response writer of every matched request. The writer
/// consumes it on the first write, so later writes pass through untouched.
pub struct ResponseSerializer {
    catalog: Arc<dyn OperationCatalog>,
    operation: Arc<Operation>,
    accept: Option<String>,
}

impl ResponseSerializer {
    /// Creates a serializer for one request.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn OperationCatalog>,
        operation: Arc<Operation>,
        accept: Option<String>,
    ) -> Self {
        Self {
            catalog,
            operation,
            accept,
        }
    }

    fn negotiate_content_type(&self, head: &mut ResponseHead, status: StatusCode) {
        if head.content_type().is_some() || !self.catalog.supports_content_negotiation() {
            return;
        }
        let Some(response) = self.operation.response(status) else {
            return;
        };
        let chosen = media::negotiate(self.accept.as_deref(), &response.media_types());
        if let Some(value) = chosen.and_then(|c| HeaderValue::from_str(&c).ok()) {
            head.headers.insert(CONTENT_TYPE, value);
        }
    }
}

impl WriteInterceptor for ResponseSerializer {
    fn intercept(
        self: Box<Self>,
        head: &mut ResponseHead,
        body: Option<Value>,
    ) -> Result<Option<Value>, EnforcerError> {
        let status = *head.status.get_or_insert(StatusCode::OK);
        self.negotiate_content_type(head, status);

        let draft = ResponseDraft {
            status,
            headers: head.headers.clone(),
            body,
        };

        match self.catalog.serialize_response(&self.operation, draft) {
            Ok(serialized) => {
                for (name, value) in serialized.headers {
                    let parsed = HeaderName::from_bytes(name.as_bytes())
                        .ok()
                        .zip(HeaderValue::from_str(&value).ok());
                    if let Some((name, value)) = parsed {
                        head.headers.insert(name, value);
                    }
                }
                Ok(serialized.body)
            }
            Err(report) => {
                let operation = self.operation.display_name();
                warn!(operation_id = %operation, status = status.as_u16(), "response does not satisfy the contract");
                record_response_validation_failure(&operation);
                head.status = Some(StatusCode::INTERNAL_SERVER_ERROR);
                Err(EnforcerError::response_validation(
                    self.operation.operation_id().map(ToString::to_string),
                    report,
                ))
            }
        }
    }
}

impl fmt::Debug for ResponseSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSerializer")
            .field("operation", &self.operation.key())
            .field("accept", &self.accept)
            .finish_non_exhaustive()
    }
}
