//! In-memory operation catalog.
//!
//! [`Contract`] is a resolved contract held entirely in memory. It matches
//! request paths against operation templates, coerces and validates
//! parameters and bodies through each parameter's [`Schema`](crate::Schema),
//! and serializes handler output against the declared responses.
//!
//! # Example
//!
//! ```
//! use enforcer_core::{
//!     Contract, ContractVersion, JsonSchema, OperationCatalog, Operation, Parameter,
//!     ResponseSpec, ValidationRequest,
//! };
//! use http::Method;
//!
//! let contract = Contract::builder("people", ContractVersion::V3 { minor: 0 })
//!     .extension("x-controller", "people")
//!     .operation(
//!         Operation::builder(Method::GET, "/people/{id}")
//!             .operation_id("getPerson")
//!             .parameter(Parameter::path("id", JsonSchema::integer().shared()))
//!             .response(ResponseSpec::new("200").content("application/json", None))
//!             .build(),
//!     )
//!     .build();
//!
//! let parsed = contract
//!     .request(&ValidationRequest::new(Method::GET, "/people/42"))
//!     .unwrap();
//! assert_eq!(parsed.path["id"], 42);
//! ```

use crate::catalog::{
    ContractVersion, Extensions, OperationCatalog, ParsedRequest, RequestRejection,
    ResponseDraft, SerializedResponse, ValidationRequest,
};
use crate::error::EnforcerError;
use crate::operation::{Operation, Parameter, ParameterLocation};
use crate::report::ErrorReport;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// A resolved contract held in memory.
#[derive(Debug, Clone)]
pub struct Contract {
    title: String,
    version: ContractVersion,
    info_version: String,
    extensions: Extensions,
    path_extensions: IndexMap<String, Extensions>,
    operations: Vec<Arc<Operation>>,
}

impl Contract {
    /// Creates a new contract builder.
    #[must_use]
    pub fn builder(title: impl Into<String>, version: ContractVersion) -> ContractBuilder {
        ContractBuilder::new(title, version)
    }

    /// Returns the contract title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the document's own version string (`info.version`).
    #[must_use]
    pub fn info_version(&self) -> &str {
        &self.info_version
    }

    /// Looks up an operation by its identifier.
    #[must_use]
    pub fn get_operation(&self, operation_id: &str) -> Option<&Arc<Operation>> {
        self.operations
            .iter()
            .find(|op| op.operation_id() == Some(operation_id))
    }

    /// Finds the operation for a method and path.
    ///
    /// Templates with more literal segments win over templated ones, so
    /// `/people/me` is preferred to `/people/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestRejection::NotFound`] or
    /// [`RequestRejection::MethodNotAllowed`].
    pub fn match_operation(
        &self,
        method: &Method,
        path: &str,
    ) -> Result<(&Arc<Operation>, IndexMap<String, String>), RequestRejection> {
        let mut allowed = Vec::new();
        let mut best: Option<(&Arc<Operation>, IndexMap<String, String>)> = None;

        for operation in &self.operations {
            let Some(params) = operation.match_path(path) else {
                continue;
            };
            if operation.method() != method {
                allowed.push(operation.method().clone());
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(b, _)| operation.literal_segments() > b.literal_segments());
            if better {
                best = Some((operation, params));
            }
        }

        match best {
            Some(found) => Ok(found),
            None if allowed.is_empty() => Err(RequestRejection::NotFound),
            None => Err(RequestRejection::MethodNotAllowed { allowed }),
        }
    }

    fn parse_parameters(
        operation: &Operation,
        request: &ValidationRequest,
        raw_path: &IndexMap<String, String>,
        parsed: &mut ParsedRequest,
    ) -> Vec<ErrorReport> {
        let mut sections: IndexMap<ParameterLocation, ErrorReport> = IndexMap::new();

        for parameter in operation.parameters() {
            let raw = Self::raw_parameter(parameter, request, raw_path);
            let location = parameter.location();
            let outcome = match raw {
                None if parameter.is_required() => Err(ErrorReport::new(format!(
                    "Missing required {location} parameter \"{}\"",
                    parameter.name()
                ))),
                None => continue,
                Some(raw) => parameter.schema().deserialize(raw).map_err(|report| {
                    relabel(
                        format!("Invalid value for {location} parameter \"{}\"", parameter.name()),
                        report,
                    )
                }),
            };

            match outcome {
                Ok(value) => {
                    let target = match location {
                        ParameterLocation::Path => &mut parsed.path,
                        ParameterLocation::Query => &mut parsed.query,
                        ParameterLocation::Header => &mut parsed.headers,
                        ParameterLocation::Cookie => &mut parsed.cookies,
                    };
                    target.insert(parameter.name().to_string(), value);
                }
                Err(report) => sections
                    .entry(location)
                    .or_insert_with(|| ErrorReport::new(format!("In {location} parameters")))
                    .push(report),
            }
        }

        sections.into_values().collect()
    }

    fn raw_parameter(
        parameter: &Parameter,
        request: &ValidationRequest,
        raw_path: &IndexMap<String, String>,
    ) -> Option<Value> {
        let name = parameter.name();
        match parameter.location() {
            ParameterLocation::Path => raw_path.get(name).cloned().map(Value::String),
            ParameterLocation::Query => match request.query.get(name).map(Vec::as_slice) {
                None | Some([]) => None,
                Some([single]) => Some(Value::String(single.clone())),
                Some(many) => Some(Value::Array(
                    many.iter().cloned().map(Value::String).collect(),
                )),
            },
            ParameterLocation::Header => request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| Value::String(v.to_string())),
            ParameterLocation::Cookie => request.cookies.get(name).cloned().map(Value::String),
        }
    }

    /// Parses the body. The `Err` carries the status to report alongside the section.
    fn parse_body(
        operation: &Operation,
        request: &ValidationRequest,
        parsed: &mut ParsedRequest,
    ) -> Result<(), (StatusCode, ErrorReport)> {
        let Some(declared) = operation.request_body() else {
            parsed.body.clone_from(&request.body);
            return Ok(());
        };

        let Some(body) = request.body.clone() else {
            if declared.is_required() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    ErrorReport::new("In body").with_message("Missing required request body"),
                ));
            }
            return Ok(());
        };

        let content_type = request.content_type();
        let schema = declared.schema_for(content_type).map_err(|()| {
            (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorReport::new("In body").with_message(format!(
                    "Content type {} is not one of: {}",
                    content_type.unwrap_or("(none)"),
                    declared.media_types().join(", ")
                )),
            )
        })?;

        parsed.body = match schema {
            Some(schema) => Some(schema.deserialize(body).map_err(|report| {
                (StatusCode::BAD_REQUEST, relabel("In body", report))
            })?),
            None => Some(body),
        };
        Ok(())
    }

    fn serialize_body(
        &self,
        operation: &Operation,
        draft: &ResponseDraft,
        body: Value,
    ) -> Result<Option<Value>, ErrorReport> {
        let status = draft.status.as_str();
        let response = operation
            .response(draft.status)
            .ok_or_else(|| ErrorReport::new(format!("No response declared for status {status}")))?;

        let schema = match self.version {
            ContractVersion::V2 => response.body_schema(),
            ContractVersion::V3 { .. } => {
                if response.media_types().is_empty() {
                    return Ok(None);
                }
                let content_type = draft
                    .headers
                    .get(http::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/json");
                let (_, schema) = response.content_for(content_type).ok_or_else(|| {
                    ErrorReport::new(format!(
                        "Content type {content_type} is not declared for status {status}"
                    ))
                })?;
                if schema.is_none() {
                    return Ok(Some(body));
                }
                schema
            }
        };

        match schema {
            Some(schema) => schema.serialize(body).map(Some),
            None => Ok(None),
        }
    }

    fn serialize_headers(
        operation: &Operation,
        draft: &ResponseDraft,
        out: &mut IndexMap<String, String>,
    ) -> Vec<ErrorReport> {
        let Some(response) = operation.response(draft.status) else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for (name, schema) in response.headers() {
            let Some(raw) = draft.headers.get(name).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            let serialized = schema
                .deserialize(Value::String(raw.to_string()))
                .and_then(|value| schema.serialize(value));
            match serialized {
                Ok(Value::String(s)) => {
                    out.insert(name.clone(), s);
                }
                Ok(other) => {
                    out.insert(name.clone(), other.to_string());
                }
                Err(report) => errors.push(relabel(format!("In header \"{name}\""), report)),
            }
        }
        errors
    }
}

impl OperationCatalog for Contract {
    fn version(&self) -> ContractVersion {
        self.version
    }

    fn operations(&self) -> Vec<Arc<Operation>> {
        self.operations.clone()
    }

    fn path_extensions(&self, path: &str) -> Option<&Extensions> {
        self.path_extensions.get(path)
    }

    fn root_extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn request(&self, request: &ValidationRequest) -> Result<ParsedRequest, RequestRejection> {
        let (operation, raw_path) = self.match_operation(&request.method, &request.path)?;
        let mut parsed = ParsedRequest::new(Arc::clone(operation));

        let mut sections = Self::parse_parameters(operation, request, &raw_path, &mut parsed);
        let mut status = StatusCode::BAD_REQUEST;
        if let Err((body_status, section)) = Self::parse_body(operation, request, &mut parsed) {
            if sections.is_empty() {
                status = body_status;
            }
            sections.push(section);
        }

        if sections.is_empty() {
            return Ok(parsed);
        }

        let report = sections
            .into_iter()
            .fold(ErrorReport::new("Request has one or more errors"), ErrorReport::with_child);
        Err(RequestRejection::Invalid {
            operation: Arc::clone(operation),
            status,
            report,
        })
    }

    fn serialize_response(
        &self,
        operation: &Operation,
        draft: ResponseDraft,
    ) -> Result<SerializedResponse, ErrorReport> {
        if operation.response(draft.status).is_none() {
            return Err(ErrorReport::new("Response has one or more errors").with_child(
                ErrorReport::new(format!(
                    "No response declared for status {}",
                    draft.status.as_str()
                )),
            ));
        }
        let mut serialized = SerializedResponse::default();
        let mut errors = Self::serialize_headers(operation, &draft, &mut serialized.headers);

        if let Some(body) = draft.body.clone() {
            match self.serialize_body(operation, &draft, body) {
                Ok(body) => serialized.body = body,
                Err(report) => errors.push(relabel("In body", report)),
            }
        }

        if errors.is_empty() {
            Ok(serialized)
        } else {
            Err(errors
                .into_iter()
                .fold(ErrorReport::new("Response has one or more errors"), ErrorReport::with_child))
        }
    }
}

/// Replaces a schema report's generic header with a contextual one.
fn relabel(header: impl Into<String>, report: ErrorReport) -> ErrorReport {
    if report.is_leaf() {
        return ErrorReport::new(header).with_child(report);
    }
    report
        .children()
        .iter()
        .cloned()
        .fold(ErrorReport::new(header), ErrorReport::with_child)
}

/// Builder for creating [`Contract`] instances.
#[derive(Debug)]
pub struct ContractBuilder {
    title: String,
    version: ContractVersion,
    info_version: String,
    extensions: Extensions,
    path_extensions: IndexMap<String, Extensions>,
    operations: Vec<Arc<Operation>>,
}

impl ContractBuilder {
    /// Creates a new contract builder.
    #[must_use]
    pub fn new(title: impl Into<String>, version: ContractVersion) -> Self {
        Self {
            title: title.into(),
            version,
            info_version: "1.0.0".to_string(),
            extensions: Extensions::new(),
            path_extensions: IndexMap::new(),
            operations: Vec::new(),
        }
    }

    /// Sets the contract version from a raw document's version markers.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Contract`] when the version is missing or malformed.
    pub fn detect_version(mut self, document: &Value) -> Result<Self, EnforcerError> {
        self.version = ContractVersion::detect(document)?;
        Ok(self)
    }

    /// Sets the document's own version string.
    #[must_use]
    pub fn info_version(mut self, version: impl Into<String>) -> Self {
        self.info_version = version.into();
        self
    }

    /// Sets a root-level extension value.
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Sets an extension value on a path template.
    #[must_use]
    pub fn path_extension(
        mut self,
        path: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.path_extensions
            .entry(path.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Adds an operation.
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    /// Builds the contract.
    #[must_use]
    pub fn build(self) -> Contract {
        Contract {
            title: self.title,
            version: self.version,
            info_version: self.info_version,
            extensions: self.extensions,
            path_extensions: self.path_extensions,
            operations: self.operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::people_contract;
    use crate::operation::{RequestBody, ResponseSpec};
    use crate::schema::JsonSchema;
    use http::{HeaderMap, HeaderValue};
    use serde_json::json;

    fn v3() -> Contract {
        people_contract(ContractVersion::V3 { minor: 0 })
    }

    fn json_post(path: &str, body: Value) -> ValidationRequest {
        let mut request = ValidationRequest::new(Method::POST, path).body(body);
        request
            .headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let result = v3().request(&ValidationRequest::new(Method::GET, "/animals"));
        assert!(matches!(result, Err(RequestRejection::NotFound)));
    }

    #[test]
    fn test_wrong_method_lists_allowed() {
        let result = v3().request(&ValidationRequest::new(Method::PATCH, "/people/1"));
        let Err(RequestRejection::MethodNotAllowed { allowed }) = result else {
            panic!("expected method not allowed");
        };
        assert_eq!(allowed, vec![Method::GET, Method::DELETE]);
    }

    #[test]
    fn test_literal_template_wins() {
        let contract = Contract::builder("t", ContractVersion::V2)
            .operation(Operation::builder(Method::GET, "/people/{id}").operation_id("byId").build())
            .operation(Operation::builder(Method::GET, "/people/me").operation_id("me").build())
            .build();
        let (op, _) = contract.match_operation(&Method::GET, "/people/me").unwrap();
        assert_eq!(op.operation_id(), Some("me"));
        let (op, params) = contract.match_operation(&Method::GET, "/people/9").unwrap();
        assert_eq!(op.operation_id(), Some("byId"));
        assert_eq!(params["id"], "9");
    }

    #[test]
    fn test_parameters_are_coerced() {
        let parsed = v3()
            .request(&ValidationRequest::new(Method::GET, "/people").query("limit", "5"))
            .unwrap();
        assert_eq!(parsed.operation.operation_id(), Some("listPeople"));
        assert_eq!(parsed.query["limit"], json!(5));
    }

    #[test]
    fn test_invalid_parameters_are_grouped() {
        let result = v3().request(&ValidationRequest::new(Method::GET, "/people").query("limit", "many"));
        let Err(RequestRejection::Invalid {
            operation,
            status,
            report,
        }) = result
        else {
            panic!("expected invalid request");
        };
        assert_eq!(operation.operation_id(), Some("listPeople"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(report.header(), "Request has one or more errors");
        assert_eq!(report.children()[0].header(), "In query parameters");
        assert_eq!(
            report.children()[0].children()[0].header(),
            "Invalid value for query parameter \"limit\""
        );
    }

    #[test]
    fn test_body_validation() {
        let contract = v3();
        let ok = contract
            .request(&json_post("/people", json!({ "id": 1, "name": "Ada" })))
            .unwrap();
        assert_eq!(ok.body, Some(json!({ "id": 1, "name": "Ada" })));

        let Err(RequestRejection::Invalid { report, .. }) =
            contract.request(&json_post("/people", json!({ "id": 0 })))
        else {
            panic!("expected invalid body");
        };
        let body = &report.children()[0];
        assert_eq!(body.header(), "In body");
        assert_eq!(body.children().len(), 2);
    }

    #[test]
    fn test_missing_required_body() {
        let result = v3().request(&ValidationRequest::new(Method::POST, "/people"));
        let Err(RequestRejection::Invalid { report, .. }) = result else {
            panic!("expected invalid request");
        };
        assert_eq!(
            report.children()[0].children()[0].header(),
            "Missing required request body"
        );
    }

    #[test]
    fn test_unsupported_content_type() {
        let mut request = ValidationRequest::new(Method::POST, "/people").body(json!("x"));
        request
            .headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let Err(RequestRejection::Invalid { status, .. }) = v3().request(&request) else {
            panic!("expected invalid request");
        };
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_header_and_cookie_parameters() {
        let contract = Contract::builder("t", ContractVersion::V2)
            .operation(
                Operation::builder(Method::GET, "/")
                    .parameter(Parameter::header("X-Page", JsonSchema::integer().shared()).required())
                    .parameter(Parameter::cookie("session", JsonSchema::string().shared()).required())
                    .build(),
            )
            .build();

        let mut request = ValidationRequest::new(Method::GET, "/");
        request.headers.insert("x-page", HeaderValue::from_static("3"));
        request.cookies.insert("session".to_string(), "abc".to_string());
        let parsed = contract.request(&request).unwrap();
        assert_eq!(parsed.headers["x-page"], json!(3));
        assert_eq!(parsed.cookies["session"], json!("abc"));

        let Err(RequestRejection::Invalid { report, .. }) =
            contract.request(&ValidationRequest::new(Method::GET, "/"))
        else {
            panic!("expected invalid request");
        };
        let sections: Vec<&str> = report.children().iter().map(ErrorReport::header).collect();
        assert_eq!(sections, vec!["In header parameters", "In cookie parameters"]);
    }

    #[test]
    fn test_serialize_reformats_dates() {
        let contract = v3();
        let op = contract.get_operation("getPerson").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let serialized = contract
            .serialize_response(
                op,
                ResponseDraft {
                    status: StatusCode::OK,
                    headers,
                    body: Some(json!({ "id": 1, "name": "Ada", "birthday": "1815-12-10T08:00:00Z" })),
                },
            )
            .unwrap();
        assert_eq!(serialized.body.unwrap()["birthday"], "1815-12-10");
    }

    #[test]
    fn test_serialize_rejects_invalid_body() {
        let contract = people_contract(ContractVersion::V2);
        let op = contract.get_operation("getPerson").unwrap();
        let err = contract
            .serialize_response(
                op,
                ResponseDraft {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Some(json!({ "name": "" })),
                },
            )
            .unwrap_err();
        assert_eq!(err.header(), "Response has one or more errors");
        assert_eq!(err.children()[0].header(), "In body");
    }

    #[test]
    fn test_serialize_undeclared_status() {
        let contract = v3();
        let op = contract.get_operation("deletePerson").unwrap();
        let err = contract
            .serialize_response(
                op,
                ResponseDraft {
                    status: StatusCode::IM_A_TEAPOT,
                    headers: HeaderMap::new(),
                    body: Some(json!("tea")),
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("No response declared for status 418"));
    }

    #[test]
    fn test_response_without_content_drops_body() {
        let contract = v3();
        let op = contract.get_operation("getPerson").unwrap();
        let serialized = contract
            .serialize_response(
                op,
                ResponseDraft {
                    status: StatusCode::NOT_FOUND,
                    headers: HeaderMap::new(),
                    body: Some(json!("missing")),
                },
            )
            .unwrap();
        assert!(serialized.body.is_none());
    }

    #[test]
    fn test_declared_headers_are_serialized() {
        let contract = Contract::builder("t", ContractVersion::V2)
            .operation(
                Operation::builder(Method::GET, "/")
                    .request_body(RequestBody::new(JsonSchema::any().shared()))
                    .response(
                        ResponseSpec::new("200")
                            .header("Last-Modified", JsonSchema::date_time().shared()),
                    )
                    .build(),
            )
            .build();
        let operations = contract.operations();
        let op = &operations[0];
        let mut headers = HeaderMap::new();
        headers.insert("last-modified", HeaderValue::from_static("2024-01-01T01:00:00+01:00"));
        let serialized = contract
            .serialize_response(
                op,
                ResponseDraft {
                    status: StatusCode::OK,
                    headers,
                    body: None,
                },
            )
            .unwrap();
        assert_eq!(serialized.headers["last-modified"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_extensions() {
        let contract = Contract::builder("t", ContractVersion::V2)
            .extension("x-controller", "root")
            .path_extension("/a", "x-controller", "a")
            .build();
        assert_eq!(contract.root_extensions()["x-controller"], "root");
        assert_eq!(contract.path_extensions("/a").unwrap()["x-controller"], "a");
        assert!(contract.path_extensions("/b").is_none());
    }

    #[test]
    fn test_detect_version_on_builder() {
        let built = ContractBuilder::new("t", ContractVersion::V2)
            .detect_version(&json!({ "openapi": "3.1.0" }))
            .unwrap()
            .build();
        assert_eq!(built.version(), ContractVersion::V3 { minor: 1 });
        assert!(ContractBuilder::new("t", ContractVersion::V2)
            .detect_version(&json!({ "openapi": "banana" }))
            .is_err());
    }
}
