//! Operation descriptions.
//!
//! An [`Operation`] identifies one method + path template of the contract
//! and owns its parameters, request body and declared responses. Operations
//! are immutable once built and shared read-only across requests.

use crate::catalog::Extensions;
use crate::media;
use crate::schema::SchemaRef;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    /// A templated path segment.
    Path,
    /// A query string entry.
    Query,
    /// A request header.
    Header,
    /// A cookie.
    Cookie,
}

impl ParameterLocation {
    /// Returns the lowercase name used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    location: ParameterLocation,
    required: bool,
    schema: SchemaRef,
}

impl Parameter {
    /// Creates a parameter. Path parameters are always required.
    #[must_use]
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: SchemaRef) -> Self {
        let name = name.into();
        Self {
            name: if location == ParameterLocation::Header {
                name.to_ascii_lowercase()
            } else {
                name
            },
            location,
            required: location == ParameterLocation::Path,
            schema,
        }
    }

    /// Creates a path parameter.
    #[must_use]
    pub fn path(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, ParameterLocation::Path, schema)
    }

    /// Creates an optional query parameter.
    #[must_use]
    pub fn query(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, ParameterLocation::Query, schema)
    }

    /// Creates an optional header parameter.
    #[must_use]
    pub fn header(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, ParameterLocation::Header, schema)
    }

    /// Creates an optional cookie parameter.
    #[must_use]
    pub fn cookie(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, ParameterLocation::Cookie, schema)
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter location.
    #[must_use]
    pub fn location(&self) -> ParameterLocation {
        self.location
    }

    /// Returns whether the parameter must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

/// A declared request body.
#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    required: bool,
    schema: Option<SchemaRef>,
    content: IndexMap<String, SchemaRef>,
}

impl RequestBody {
    /// Creates a body with a single schema, regardless of content type.
    #[must_use]
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            required: false,
            schema: Some(schema),
            content: IndexMap::new(),
        }
    }

    /// Creates a body whose schema depends on the content type.
    #[must_use]
    pub fn with_content() -> Self {
        Self::default()
    }

    /// Adds a schema for a media type.
    #[must_use]
    pub fn content(mut self, media_type: impl Into<String>, schema: SchemaRef) -> Self {
        self.content.insert(media_type.into(), schema);
        self
    }

    /// Marks the body as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns whether a body must be sent.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Declared media types, in declaration order.
    #[must_use]
    pub fn media_types(&self) -> Vec<&str> {
        self.content.keys().map(String::as_str).collect()
    }

    /// Resolves the schema for a request content type.
    ///
    /// Returns `Err(())` when the body declares media types and none of
    /// them accepts `content_type`.
    #[allow(clippy::result_unit_err)]
    pub fn schema_for(&self, content_type: Option<&str>) -> Result<Option<&SchemaRef>, ()> {
        if self.content.is_empty() {
            return Ok(self.schema.as_ref());
        }
        let content_type = content_type.unwrap_or("application/json");
        self.content
            .iter()
            .find(|(declared, _)| media::matches(declared, content_type))
            .map(|(_, schema)| Some(schema))
            .ok_or(())
    }
}

/// A declared response.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    status: String,
    description: Option<String>,
    schema: Option<SchemaRef>,
    content: IndexMap<String, Option<SchemaRef>>,
    headers: IndexMap<String, SchemaRef>,
}

impl ResponseSpec {
    /// Creates a response for a status key (`"200"`, `"404"`, `"default"`).
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            description: None,
            schema: None,
            content: IndexMap::new(),
            headers: IndexMap::new(),
        }
    }

    /// Sets the single body schema (legacy contracts).
    #[must_use]
    pub fn schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Declares a media type, with or without a schema.
    #[must_use]
    pub fn content(mut self, media_type: impl Into<String>, schema: Option<SchemaRef>) -> Self {
        self.content.insert(media_type.into(), schema);
        self
    }

    /// Declares a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, schema: SchemaRef) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), schema);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the status key.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the status as a [`StatusCode`]. `default` maps to 200.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        status_from_key(&self.status)
    }

    /// Returns the description.
    #[must_use]
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the single body schema (legacy contracts).
    #[must_use]
    pub fn body_schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    /// Declared media types, in declaration order.
    #[must_use]
    pub fn media_types(&self) -> Vec<&str> {
        self.content.keys().map(String::as_str).collect()
    }

    /// Looks up the declared entry that accepts `media_type`.
    #[must_use]
    pub fn content_for(&self, media_type: &str) -> Option<(&str, Option<&SchemaRef>)> {
        self.content
            .iter()
            .find(|(declared, _)| media::matches(declared, media_type))
            .map(|(declared, schema)| (declared.as_str(), schema.as_ref()))
    }

    /// Declared response headers.
    #[must_use]
    pub fn headers(&self) -> &IndexMap<String, SchemaRef> {
        &self.headers
    }
}

/// Converts a response key into a status code. `default` maps to 200.
#[must_use]
pub fn status_from_key(key: &str) -> Option<StatusCode> {
    if key.eq_ignore_ascii_case("default") {
        return Some(StatusCode::OK);
    }
    key.parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
}

/// An operation defined in a contract.
#[derive(Debug, Clone)]
pub struct Operation {
    operation_id: Option<String>,
    method: Method,
    path: String,
    path_segments: Vec<PathSegment>,
    summary: Option<String>,
    parameters: Vec<Parameter>,
    request_body: Option<RequestBody>,
    responses: IndexMap<String, ResponseSpec>,
    extensions: Extensions,
}

impl Operation {
    /// Creates a new operation builder.
    ///
    /// # Example
    ///
    /// ```
    /// use enforcer_core::{JsonSchema, Operation, ResponseSpec};
    /// use http::Method;
    ///
    /// let operation = Operation::builder(Method::GET, "/people/{id}")
    ///     .operation_id("getPerson")
    ///     .response(ResponseSpec::new("200").schema(JsonSchema::any().shared()))
    ///     .build();
    ///
    /// assert_eq!(operation.key(), "GET /people/{id}");
    /// assert!(operation.match_path("/people/7").is_some());
    /// ```
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(method, path)
    }

    /// Returns the canonical operation identifier, if declared.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path template.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the summary.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns a stable key combining method and path template.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Returns the operation id, or the key when none is declared.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.operation_id.clone().unwrap_or_else(|| self.key())
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the declared request body.
    #[must_use]
    pub fn request_body(&self) -> Option<&RequestBody> {
        self.request_body.as_ref()
    }

    /// Returns the declared responses in declaration order.
    #[must_use]
    pub fn responses(&self) -> &IndexMap<String, ResponseSpec> {
        &self.responses
    }

    /// Returns the first declared response code.
    #[must_use]
    pub fn first_response_code(&self) -> Option<&str> {
        self.responses.keys().next().map(String::as_str)
    }

    /// Looks up a response by its status key.
    #[must_use]
    pub fn response_for_key(&self, key: &str) -> Option<&ResponseSpec> {
        self.responses.get(key)
    }

    /// Looks up the response for a status, falling back to `default`.
    #[must_use]
    pub fn response(&self, status: StatusCode) -> Option<&ResponseSpec> {
        self.responses
            .get(status.as_str())
            .or_else(|| self.responses.get("default"))
    }

    /// Returns the operation's extension values.
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns an extension value as a non-empty string.
    #[must_use]
    pub fn extension_str(&self, key: &str) -> Option<&str> {
        non_empty_str(self.extensions.get(key))
    }

    /// Number of literal (non-templated) path segments.
    #[must_use]
    pub fn literal_segments(&self) -> usize {
        self.path_segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Literal(_)))
            .count()
    }

    /// Attempts to match a request path against this operation's template.
    ///
    /// Returns the raw (undecoded) path parameters if the path matches.
    #[must_use]
    pub fn match_path(&self, request_path: &str) -> Option<IndexMap<String, String>> {
        let request_segments: Vec<&str> = request_path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        if request_segments.len() != self.path_segments.len() {
            return None;
        }

        let mut params = IndexMap::new();
        for (pattern, actual) in self.path_segments.iter().zip(request_segments) {
            match pattern {
                PathSegment::Literal(lit) if lit != actual => return None,
                PathSegment::Literal(_) => {}
                PathSegment::Parameter(name) => {
                    params.insert(name.clone(), actual.to_string());
                }
            }
        }
        Some(params)
    }

    fn parse_path(path: &str) -> Vec<PathSegment> {
        path.trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) => PathSegment::Parameter(name.to_string()),
                    None => PathSegment::Literal(segment.to_string()),
                }
            })
            .collect()
    }
}

/// Returns the value as a string when it is a non-empty string.
pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Builder for creating [`Operation`] instances.
#[derive(Debug)]
pub struct OperationBuilder {
    operation_id: Option<String>,
    method: Method,
    path: String,
    summary: Option<String>,
    parameters: Vec<Parameter>,
    request_body: Option<RequestBody>,
    responses: IndexMap<String, ResponseSpec>,
    extensions: Extensions,
}

impl OperationBuilder {
    /// Creates a new operation builder.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            operation_id: None,
            method,
            path: path.into(),
            summary: None,
            parameters: Vec::new(),
            request_body: None,
            responses: IndexMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// Sets the operation identifier.
    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn request_body(mut self, body: RequestBody) -> Self {
        self.request_body = Some(body);
        self
    }

    /// Adds a declared response. Later responses with the same key replace
    /// earlier ones.
    #[must_use]
    pub fn response(mut self, response: ResponseSpec) -> Self {
        self.responses.insert(response.status.clone(), response);
        self
    }

    /// Sets an extension value (for example `x-controller`).
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Builds the operation.
    #[must_use]
    pub fn build(self) -> Operation {
        let path_segments = Operation::parse_path(&self.path);
        Operation {
            operation_id: self.operation_id,
            method: self.method,
            path: self.path,
            path_segments,
            summary: self.summary,
            parameters: self.parameters,
            request_body: self.request_body,
            responses: self.responses,
            extensions: self.extensions,
        }
    }
}

/// A path segment in an operation's path template.
#[derive(Debug, Clone)]
enum PathSegment {
    /// A literal path segment (e.g., "people").
    Literal(String),
    /// A path parameter (e.g., "{id}").
    Parameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JsonSchema;

    fn get_person() -> Operation {
        Operation::builder(Method::GET, "/people/{id}")
            .operation_id("getPerson")
            .parameter(Parameter::path("id", JsonSchema::integer().shared()))
            .response(ResponseSpec::new("200").schema(JsonSchema::any().shared()))
            .response(ResponseSpec::new("404"))
            .extension("x-operation", "fetch")
            .build()
    }

    #[test]
    fn test_path_matching() {
        let op = get_person();
        let params = op.match_path("/people/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(op.match_path("/people").is_none());
        assert!(op.match_path("/persons/42").is_none());
        assert!(op.match_path("/people/42/extra").is_none());
        assert_eq!(op.literal_segments(), 1);
    }

    #[test]
    fn test_responses_in_order() {
        let op = get_person();
        assert_eq!(op.first_response_code(), Some("200"));
        assert!(op.response(StatusCode::NOT_FOUND).is_some());
        assert!(op.response(StatusCode::CONFLICT).is_none());
    }

    #[test]
    fn test_default_response_fallback() {
        let op = Operation::builder(Method::GET, "/")
            .response(ResponseSpec::new("default"))
            .build();
        assert_eq!(op.response(StatusCode::IM_A_TEAPOT).unwrap().status(), "default");
        assert_eq!(status_from_key("default"), Some(StatusCode::OK));
        assert_eq!(status_from_key("abc"), None);
    }

    #[test]
    fn test_extension_str() {
        let op = Operation::builder(Method::GET, "/")
            .extension("x-controller", "")
            .extension("x-operation", "list")
            .extension("x-number", 3)
            .build();
        assert_eq!(op.extension_str("x-controller"), None);
        assert_eq!(op.extension_str("x-operation"), Some("list"));
        assert_eq!(op.extension_str("x-number"), None);
    }

    #[test]
    fn test_key_and_display_name() {
        let anonymous = Operation::builder(Method::POST, "/people").build();
        assert_eq!(anonymous.key(), "POST /people");
        assert_eq!(anonymous.display_name(), "POST /people");
        assert_eq!(get_person().display_name(), "getPerson");
    }

    #[test]
    fn test_header_parameters_are_lowercased() {
        let param = Parameter::header("X-Trace", JsonSchema::string().shared());
        assert_eq!(param.name(), "x-trace");
        assert!(!param.is_required());
        assert!(Parameter::path("id", JsonSchema::string().shared()).is_required());
    }

    #[test]
    fn test_request_body_content_lookup() {
        let body = RequestBody::with_content()
            .content("application/json", JsonSchema::any().shared())
            .required();
        assert!(body.schema_for(Some("application/json; charset=utf-8")).is_ok());
        assert!(body.schema_for(Some("text/plain")).is_err());
        assert!(body.schema_for(None).unwrap().is_some());

        let legacy = RequestBody::new(JsonSchema::any().shared());
        assert!(legacy.schema_for(Some("text/plain")).unwrap().is_some());
    }
}
