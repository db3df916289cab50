//! The boundary to a resolved API contract.
//!
//! The mediation layer never parses contracts itself. It talks to an
//! [`OperationCatalog`], which matches requests to operations, validates and
//! coerces their inputs, and serializes handler output against the declared
//! responses. [`Contract`](crate::Contract) is the in-memory implementation
//! shipped with this crate.

use crate::error::EnforcerError;
use crate::operation::Operation;
use crate::report::ErrorReport;
use http::{HeaderMap, Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Vendor extension values keyed by name (`x-controller`, ...).
pub type Extensions = IndexMap<String, Value>;

/// Major version of the contract document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractVersion {
    /// Legacy documents marked with a top-level `swagger` field.
    V2,
    /// Documents with an `openapi` version string.
    V3 {
        /// Minor version component.
        minor: u32,
    },
}

impl ContractVersion {
    /// Detects the version of a raw contract document.
    ///
    /// A `swagger` field marks a legacy document. Otherwise the major
    /// component of the `openapi` string decides. Anything else is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Contract`] when no version can be read.
    ///
    /// # Example
    ///
    /// ```
    /// use enforcer_core::ContractVersion;
    /// use serde_json::json;
    ///
    /// let version = ContractVersion::detect(&json!({ "openapi": "3.0.3" })).unwrap();
    /// assert_eq!(version, ContractVersion::V3 { minor: 0 });
    /// assert!(ContractVersion::detect(&json!({ "openapi": "three" })).is_err());
    /// ```
    pub fn detect(document: &Value) -> Result<Self, EnforcerError> {
        if document.get("swagger").is_some() {
            return Ok(Self::V2);
        }

        let raw = document
            .get("openapi")
            .and_then(Value::as_str)
            .ok_or_else(|| EnforcerError::contract("document has no version marker"))?;

        let mut parts = raw.trim().split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().map_or(Some(0), |p| p.parse::<u32>().ok());

        match (major, minor) {
            (Some(3), Some(minor)) => Ok(Self::V3 { minor }),
            (Some(2), Some(_)) => Ok(Self::V2),
            (Some(major), Some(_)) => Err(EnforcerError::contract(format!(
                "unsupported contract version {major} (\"{raw}\")"
            ))),
            _ => Err(EnforcerError::contract(format!(
                "malformed contract version \"{raw}\""
            ))),
        }
    }

    /// Returns the major version number.
    #[must_use]
    pub const fn major(&self) -> u32 {
        match self {
            Self::V2 => 2,
            Self::V3 { .. } => 3,
        }
    }

    /// Whether responses declare several content types.
    #[must_use]
    pub const fn supports_content_negotiation(&self) -> bool {
        matches!(self, Self::V3 { .. })
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("2.0"),
            Self::V3 { minor } => write!(f, "3.{minor}"),
        }
    }
}

/// A request normalized for validation.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    /// Request method.
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    /// Query values in arrival order.
    pub query: IndexMap<String, Vec<String>>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw cookie values.
    pub cookies: IndexMap<String, String>,
    /// Decoded body, present only when the request declares one.
    pub body: Option<Value>,
}

impl ValidationRequest {
    /// Creates a request with no query, headers, cookies or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: IndexMap::new(),
            headers: HeaderMap::new(),
            cookies: IndexMap::new(),
            body: None,
        }
    }

    /// Adds a query value.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the `content-type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// A request that matched an operation and passed validation.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    /// The matched operation.
    pub operation: Arc<Operation>,
    /// Deserialized path parameters.
    pub path: IndexMap<String, Value>,
    /// Deserialized query parameters.
    pub query: IndexMap<String, Value>,
    /// Deserialized header parameters.
    pub headers: IndexMap<String, Value>,
    /// Deserialized cookie parameters.
    pub cookies: IndexMap<String, Value>,
    /// Deserialized body.
    pub body: Option<Value>,
}

impl ParsedRequest {
    /// Creates an empty parse result for an operation.
    #[must_use]
    pub fn new(operation: Arc<Operation>) -> Self {
        Self {
            operation,
            path: IndexMap::new(),
            query: IndexMap::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            body: None,
        }
    }
}

/// Why a request was not accepted by the catalog.
#[derive(Debug, Clone)]
pub enum RequestRejection {
    /// No path template matches.
    NotFound,
    /// A path template matches but not for this method.
    MethodNotAllowed {
        /// Methods declared for the matched path.
        allowed: Vec<Method>,
    },
    /// An operation matched but its inputs are invalid.
    Invalid {
        /// The targeted operation.
        operation: Arc<Operation>,
        /// Status to report, assigned by the catalog.
        status: StatusCode,
        /// Nested per-field messages.
        report: ErrorReport,
    },
}

/// Raw handler output awaiting serialization.
#[derive(Debug, Clone)]
pub struct ResponseDraft {
    /// Response status.
    pub status: StatusCode,
    /// Headers set by the handler.
    pub headers: HeaderMap,
    /// Body passed to the writer.
    pub body: Option<Value>,
}

/// Response values after serialization against the contract.
#[derive(Debug, Clone, Default)]
pub struct SerializedResponse {
    /// Serialized header values keyed by lowercase name.
    pub headers: IndexMap<String, String>,
    /// Serialized body, `None` when the response declares no body.
    pub body: Option<Value>,
}

/// A resolved, read-only operation catalog.
pub trait OperationCatalog: Send + Sync + fmt::Debug {
    /// Returns the contract version.
    fn version(&self) -> ContractVersion;

    /// Whether responses may be content-negotiated.
    fn supports_content_negotiation(&self) -> bool {
        self.version().supports_content_negotiation()
    }

    /// Returns every operation in declaration order.
    fn operations(&self) -> Vec<Arc<Operation>>;

    /// Returns extensions declared on a path template.
    fn path_extensions(&self, path: &str) -> Option<&Extensions>;

    /// Returns extensions declared at the document root.
    fn root_extensions(&self) -> &Extensions;

    /// Matches and validates a request.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestRejection`] describing why the request was not accepted.
    fn request(&self, request: &ValidationRequest) -> Result<ParsedRequest, RequestRejection>;

    /// Validates and serializes handler output for an operation.
    ///
    /// # Errors
    ///
    /// Returns a report when the output does not satisfy the declared response.
    fn serialize_response(
        &self,
        operation: &Operation,
        draft: ResponseDraft,
    ) -> Result<SerializedResponse, ErrorReport>;
}
