//! Request classification against the catalog.
//!
//! [`RequestValidator`] turns a raw request into a [`ValidationRequest`],
//! asks the catalog to match and validate it, and classifies the result.
//! A body is only decoded when the request announces one through
//! `transfer-encoding` or a numeric `content-length`.

use enforcer_chain::{Exchange, Request};
use enforcer_core::{
    media, ErrorReport, Operation, OperationCatalog, ParsedRequest, RequestRejection,
    ValidationRequest,
};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, TRANSFER_ENCODING};
use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// How a request relates to the contract.
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// An operation matched and every input is valid.
    Matched(ParsedRequest),
    /// The request targets the contract but is not acceptable.
    ClientError {
        /// The targeted operation. `None` when only the path matched.
        operation: Option<Arc<Operation>>,
        /// Status assigned by the catalog.
        status: StatusCode,
        /// Nested per-field messages.
        report: ErrorReport,
    },
    /// No path template matches.
    Unmatched,
}

impl ValidationOutcome {
    /// Returns the targeted operation, if any.
    #[must_use]
    pub fn operation(&self) -> Option<&Arc<Operation>> {
        match self {
            Self::Matched(parsed) => Some(&parsed.operation),
            Self::ClientError { operation, .. } => operation.as_ref(),
            Self::Unmatched => None,
        }
    }
}

/// Classifies requests against an [`OperationCatalog`].
#[derive(Debug, Clone)]
pub struct RequestValidator {
    catalog: Arc<dyn OperationCatalog>,
}

impl RequestValidator {
    /// Creates a validator for a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn OperationCatalog>) -> Self {
        Self { catalog }
    }

    /// Classifies the exchange's request.
    ///
    /// A matched request has its parse result and operation attached to the
    /// exchange context. An invalid request has only its operation attached.
    pub fn validate(&self, exchange: &mut Exchange) -> ValidationOutcome {
        let request = normalize(&exchange.request);
        let outcome = self.classify(&request);

        match &outcome {
            ValidationOutcome::Matched(parsed) => {
                debug!(
                    operation_id = parsed.operation.operation_id().unwrap_or_default(),
                    http.method = %request.method,
                    http.path = %request.path,
                    "request matched"
                );
                exchange.context.set_parsed(parsed.clone());
            }
            ValidationOutcome::ClientError {
                operation, status, ..
            } => {
                debug!(
                    http.method = %request.method,
                    http.path = %request.path,
                    status = status.as_u16(),
                    "request rejected"
                );
                if let Some(operation) = operation {
                    exchange.context.set_operation(Arc::clone(operation));
                }
            }
            ValidationOutcome::Unmatched => {
                debug!(http.method = %request.method, http.path = %request.path, "no operation matches");
            }
        }

        outcome
    }

    /// Classifies an already normalized request.
    #[must_use]
    pub fn classify(&self, request: &ValidationRequest) -> ValidationOutcome {
        match self.catalog.request(request) {
            Ok(parsed) => ValidationOutcome::Matched(parsed),
            Err(RequestRejection::NotFound) => ValidationOutcome::Unmatched,
            Err(RequestRejection::MethodNotAllowed { allowed }) => {
                let allowed = allowed
                    .iter()
                    .map(http::Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                ValidationOutcome::ClientError {
                    operation: None,
                    status: StatusCode::METHOD_NOT_ALLOWED,
                    report: ErrorReport::new(format!(
                        "Method {} not allowed for {}",
                        request.method, request.path
                    ))
                    .with_message(format!("Allowed methods: {allowed}")),
                }
            }
            Err(RequestRejection::Invalid {
                operation,
                status,
                report,
            }) => ValidationOutcome::ClientError {
                operation: Some(operation),
                status,
                report,
            },
        }
    }
}

/// Builds the catalog's view of a raw request.
#[must_use]
pub fn normalize(request: &Request) -> ValidationRequest {
    let mut normalized = ValidationRequest::new(request.method().clone(), request.uri().path());
    normalized.query = parse_query(request.uri().query());
    normalized.headers = request.headers().clone();
    normalized.cookies = parse_cookies(request.headers());
    if has_body(request.headers()) {
        normalized.body = Some(decode_body(
            request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            request.body(),
        ));
    }
    normalized
}

/// Returns `true` when the headers announce a body.
#[must_use]
pub fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().parse::<u64>().is_ok())
}

/// Decodes a payload by content type.
///
/// JSON payloads (and payloads without a content type) are parsed; when
/// parsing fails the raw text is kept so the schema reports the mismatch.
/// An empty JSON payload is `null`.
fn decode_body(content_type: Option<&str>, payload: &[u8]) -> Value {
    let json = content_type.map_or(true, media::is_json);
    let text = String::from_utf8_lossy(payload);

    if !json {
        return Value::String(text.into_owned());
    }
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(payload).unwrap_or_else(|_| Value::String(text.into_owned()))
}

/// Parses a query string into values grouped by name, in arrival order.
#[must_use]
pub fn parse_query(query: Option<&str>) -> IndexMap<String, Vec<String>> {
    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return grouped;
    };

    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => {
            for (name, value) in pairs {
                grouped.entry(name).or_default().push(value);
            }
        }
        Err(err) => debug!(error = %err, "ignoring undecodable query string"),
    }
    grouped
}

fn parse_cookies(headers: &HeaderMap) -> IndexMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}
