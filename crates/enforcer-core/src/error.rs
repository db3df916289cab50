//! Error types for Enforcer.
//!
//! [`EnforcerError`] covers every failure the mediation layer can surface:
//!
//! | Variant | Status | Raised |
//! |---|---|---|
//! | `RouteNotFound` | 404 | per request, only when fallthrough is disabled |
//! | `RequestValidation` | resolver-assigned (typically 400) | per request |
//! | `ResponseValidation` | 500 | per request, by the response serializer |
//! | `ControllerBinding` | 500 | once, when the controller registry is built |
//! | `MockGeneration` | 501 | per request, by the mock generator |
//! | `Contract` | 500 | when the contract fails to resolve |
//! | `Handler` | handler-assigned (default 500) | by user handlers |
//! | `Configuration` | 500 | at setup |
//!
//! Per-request errors travel through the handler chain's error branch so that
//! registered error handlers can shape the final response.

use crate::report::ErrorReport;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`EnforcerError`].
pub type EnforcerResult<T> = Result<T, EnforcerError>;

/// Standard error type for Enforcer.
///
/// # Example
///
/// ```
/// use enforcer_core::{EnforcerError, ErrorReport};
/// use http::StatusCode;
///
/// let error = EnforcerError::mock_generation(
///     ErrorReport::new("unable to mock: no response for status code")
///         .with_message("status code 418 is not declared"),
/// );
/// assert_eq!(error.status_code(), StatusCode::NOT_IMPLEMENTED);
/// ```
#[derive(Error, Debug)]
pub enum EnforcerError {
    /// No operation matches the request method and path.
    #[error("Route not found: {method} {path}")]
    RouteNotFound {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },

    /// Request parameters or body do not satisfy the contract.
    #[error("{report}")]
    RequestValidation {
        /// The targeted operation, when one was matched.
        operation_id: Option<String>,
        /// Status assigned by the catalog.
        status: StatusCode,
        /// Per-field messages.
        report: ErrorReport,
    },

    /// A handler produced a body that does not satisfy the contract.
    #[error("{report}")]
    ResponseValidation {
        /// The operation whose response failed.
        operation_id: Option<String>,
        /// Serialization messages.
        report: ErrorReport,
    },

    /// One or more operations could not be bound to a controller.
    #[error("{report}")]
    ControllerBinding {
        /// Every unresolved binding.
        report: ErrorReport,
    },

    /// A requested or automatic mock could not be produced.
    #[error("{report}")]
    MockGeneration {
        /// What went wrong.
        report: ErrorReport,
    },

    /// The contract could not be resolved or is malformed.
    #[error("Contract error: {message}")]
    Contract {
        /// Human-readable error message.
        message: String,
    },

    /// A user handler failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Response status to report.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Invalid setup options.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },
}

impl EnforcerError {
    /// Creates a route-not-found error.
    #[must_use]
    pub fn route_not_found(method: Method, path: impl Into<String>) -> Self {
        Self::RouteNotFound {
            method,
            path: path.into(),
        }
    }

    /// Creates a request validation error.
    #[must_use]
    pub fn request_validation(
        operation_id: Option<String>,
        status: StatusCode,
        report: ErrorReport,
    ) -> Self {
        Self::RequestValidation {
            operation_id,
            status,
            report,
        }
    }

    /// Creates a response validation error.
    #[must_use]
    pub fn response_validation(operation_id: Option<String>, report: ErrorReport) -> Self {
        Self::ResponseValidation {
            operation_id,
            report,
        }
    }

    /// Creates a controller binding error.
    #[must_use]
    pub fn controller_binding(report: ErrorReport) -> Self {
        Self::ControllerBinding { report }
    }

    /// Creates a mock generation error.
    #[must_use]
    pub fn mock_generation(report: ErrorReport) -> Self {
        Self::MockGeneration { report }
    }

    /// Creates a contract error.
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Creates a handler error reported as 500.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::handler_with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Creates a handler error with an explicit status.
    #[must_use]
    pub fn handler_with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Handler {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error wrapping a source error.
    pub fn handler_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Handler {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RequestValidation { status, .. } | Self::Handler { status, .. } => *status,
            Self::MockGeneration { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::ResponseValidation { .. }
            | Self::ControllerBinding { .. }
            | Self::Contract { .. }
            | Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            Self::RequestValidation { .. } => "REQUEST_VALIDATION_ERROR",
            Self::ResponseValidation { .. } => "RESPONSE_VALIDATION_ERROR",
            Self::ControllerBinding { .. } => "CONTROLLER_BINDING_ERROR",
            Self::MockGeneration { .. } => "MOCK_GENERATION_ERROR",
            Self::Contract { .. } => "CONTRACT_ERROR",
            Self::Handler { .. } => "HANDLER_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }

    /// Returns the nested report, if this error carries one.
    #[must_use]
    pub fn report(&self) -> Option<&ErrorReport> {
        match self {
            Self::RequestValidation { report, .. }
            | Self::ResponseValidation { report, .. }
            | Self::ControllerBinding { report }
            | Self::MockGeneration { report } => Some(report),
            _ => None,
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let (message, details) = match self.report() {
            Some(report) => (
                report.header().to_string(),
                report.lines().into_iter().skip(1).map(|l| l.trim_start().to_string()).collect(),
            ),
            None => (self.to_string(), Vec::new()),
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                status: self.status_code().as_u16(),
                message,
                details,
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable error message.
    pub message: String,
    /// Nested messages, flattened in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            EnforcerError::route_not_found(Method::GET, "/nope").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EnforcerError::request_validation(None, StatusCode::BAD_REQUEST, "bad".into())
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EnforcerError::response_validation(None, "bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            EnforcerError::mock_generation("no".into()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            EnforcerError::handler_with_status(StatusCode::CONFLICT, "taken").status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_display_uses_report() {
        let error = EnforcerError::controller_binding(
            ErrorReport::new("root").with_message("child"),
        );
        assert_eq!(error.to_string(), "root\n  child");
    }

    #[test]
    fn test_envelope_flattens_report() {
        let error = EnforcerError::request_validation(
            Some("listPeople".to_string()),
            StatusCode::BAD_REQUEST,
            ErrorReport::new("Request has one or more errors")
                .with_child(ErrorReport::new("In query parameters").with_message("limit")),
        );

        let envelope = error.to_envelope(Some("req-1"));
        assert_eq!(envelope.error.code, "REQUEST_VALIDATION_ERROR");
        assert_eq!(envelope.error.status, 400);
        assert_eq!(envelope.error.message, "Request has one or more errors");
        assert_eq!(envelope.error.details, vec!["In query parameters", "limit"]);
        assert_eq!(envelope.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_envelope_without_report() {
        let envelope = EnforcerError::contract("boom").to_envelope(None);
        assert_eq!(envelope.error.message, "Contract error: boom");
        assert!(envelope.error.details.is_empty());

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("request_id").is_none());
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_handler_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let error = EnforcerError::handler_with_source("write failed", io);
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
