//! Controllers defined in data files.
//!
//! A controller file maps operation names to canned responses:
//!
//! ```json
//! {
//!   "listPeople": { "status": 200, "body": [{ "id": 1, "name": "Ada" }] },
//!   "getPerson": [
//!     { "headers": { "x-source": "fixture" }, "continue": true },
//!     { "status": 200, "body": { "id": 1, "name": "Ada" } }
//!   ]
//! }
//! ```
//!
//! An object becomes one handler, an array of objects becomes a handler
//! list, and any other value is recorded as an invalid binding. TOML files
//! use the same layout.

use crate::error::ControllerError;
use crate::module::{Binding, Controller, ControllerModule};
use enforcer_chain::{BoxFuture, Exchange, Flow, Handler, HandlerEntry, HandlerResult};
use enforcer_core::EnforcerError;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// A handler that writes a fixed response.
///
/// Without an explicit `status`, the status requested by a mock trigger is
/// used when one was attached to the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CannedResponse {
    /// Response status.
    #[serde(default)]
    pub status: Option<u16>,
    /// Headers to set.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Body to write through the response serializer.
    #[serde(default)]
    pub body: Option<Value>,
    /// Pass control on instead of completing the response.
    #[serde(default, rename = "continue")]
    pub pass: bool,
}

impl CannedResponse {
    fn resolve_status(&self, exchange: &Exchange) -> Result<Option<StatusCode>, EnforcerError> {
        match self.status {
            Some(code) => StatusCode::from_u16(code).map(Some).map_err(|e| {
                EnforcerError::handler_with_source(format!("invalid canned status {code}"), e)
            }),
            None => Ok(exchange.context.mock().and_then(|decision| decision.status())),
        }
    }

    fn header_map(&self) -> Result<HeaderMap, EnforcerError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| EnforcerError::handler_with_source("invalid canned header name", e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| EnforcerError::handler_with_source("invalid canned header value", e))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl Handler for CannedResponse {
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let status = self.resolve_status(exchange)?;
            let headers = self.header_map()?;

            if self.pass && self.body.is_none() {
                if let Some(status) = status {
                    exchange.response.set_status(status);
                }
                exchange.response.headers_mut().extend(headers);
                return Ok(Flow::Next);
            }

            exchange.response.set_marker("controller");
            exchange.response.write(status, headers, self.body.clone())?;
            Ok::<_, EnforcerError>(if self.pass { Flow::Next } else { Flow::Halt })
        })
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn canned(value: Value) -> Result<CannedResponse, String> {
    if !value.is_object() {
        return Err(describe(&value).to_string());
    }
    serde_json::from_value(value).map_err(|e| format!("an invalid canned response ({e})"))
}

/// Converts one operation entry of a controller file into a binding.
#[must_use]
pub fn binding_from_value(value: Value) -> Binding {
    match value {
        Value::Array(items) => {
            let entries: Result<Vec<_>, String> = items
                .into_iter()
                .map(|item| canned(item).map(HandlerEntry::normal))
                .collect();
            match entries {
                Ok(entries) => Binding::Handlers(entries),
                Err(description) => Binding::Invalid(format!("a list containing {description}")),
            }
        }
        other => match canned(other) {
            Ok(response) => Binding::Handler(std::sync::Arc::new(response)),
            Err(description) => Binding::Invalid(description),
        },
    }
}

/// Converts a parsed controller document into a controller.
///
/// # Errors
///
/// Returns a description when the document is not an object.
pub fn controller_from_value(document: Value) -> Result<Controller, String> {
    let Value::Object(operations) = document else {
        return Err(format!("expected an object, found {}", describe(&document)));
    };

    Ok(operations
        .into_iter()
        .fold(Controller::new(), |controller, (name, value)| {
            controller.binding(name, binding_from_value(value))
        }))
}

/// Loads controller modules from files.
pub trait ModuleLoader: Send + Sync + 'static {
    /// File extensions this loader understands, in lookup order.
    fn extensions(&self) -> &[&'static str];

    /// Loads the module stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    fn load(&self, path: &Path) -> Result<ControllerModule, ControllerError>;
}

/// Loads canned-response controllers from `.json` and `.toml` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedLoader;

impl ModuleLoader for CannedLoader {
    fn extensions(&self) -> &[&'static str] {
        &["json", "toml"]
    }

    fn load(&self, path: &Path) -> Result<ControllerModule, ControllerError> {
        let content = std::fs::read_to_string(path).map_err(|source| ControllerError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let document: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<toml::Value>(&content)
                .map_err(|e| ControllerError::parse(path, e.to_string()))
                .and_then(|v| {
                    serde_json::to_value(v).map_err(|e| ControllerError::parse(path, e.to_string()))
                })?,
            _ => serde_json::from_str(&content)
                .map_err(|e| ControllerError::parse(path, e.to_string()))?,
        };

        controller_from_value(document)
            .map(ControllerModule::from_controller)
            .map_err(|message| ControllerError::parse(path, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn exchange() -> Exchange {
        Exchange::new(http::Request::new(Bytes::new()))
    }

    #[test]
    fn test_bindings_from_values() {
        assert!(matches!(
            binding_from_value(json!({ "status": 200, "body": [] })),
            Binding::Handler(_)
        ));
        assert!(matches!(
            binding_from_value(json!([{ "continue": true }, { "body": 1 }])),
            Binding::Handlers(ref entries) if entries.len() == 2
        ));
        assert!(matches!(
            binding_from_value(json!(42)),
            Binding::Invalid(ref d) if d == "a number"
        ));
        assert!(matches!(
            binding_from_value(json!([{ "body": 1 }, "nope"])),
            Binding::Invalid(ref d) if d == "a list containing a string"
        ));
        assert!(matches!(
            binding_from_value(json!({ "stat": 200 })),
            Binding::Invalid(ref d) if d.starts_with("an invalid canned response")
        ));
    }

    #[test]
    fn test_document_must_be_object() {
        assert_eq!(
            controller_from_value(json!([])).unwrap_err(),
            "expected an object, found an array"
        );
    }

    #[tokio::test]
    async fn test_canned_response_writes() {
        let canned = CannedResponse {
            status: Some(201),
            headers: IndexMap::from([("x-source".to_string(), "fixture".to_string())]),
            body: Some(json!({ "id": 1 })),
            pass: false,
        };
        let mut ex = exchange();
        let flow = canned.call(&mut ex).await.unwrap();
        assert_eq!(flow, Flow::Halt);
        assert_eq!(ex.response.status(), Some(StatusCode::CREATED));
        assert_eq!(ex.response.header("x-source"), Some("fixture"));
        assert_eq!(ex.response.marker(), Some("controller"));
        assert_eq!(ex.response.body().unwrap().as_ref(), br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_pass_through_sets_headers_only() {
        let canned = CannedResponse {
            headers: IndexMap::from([("x-step".to_string(), "1".to_string())]),
            pass: true,
            ..CannedResponse::default()
        };
        let mut ex = exchange();
        assert_eq!(canned.call(&mut ex).await.unwrap(), Flow::Next);
        assert!(!ex.response.is_sent());
        assert_eq!(ex.response.header("x-step"), Some("1"));
    }

    #[tokio::test]
    async fn test_invalid_status_is_an_error() {
        let canned = CannedResponse {
            status: Some(42),
            ..CannedResponse::default()
        };
        assert!(canned.call(&mut exchange()).await.is_err());
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.toml");
        std::fs::write(
            &path,
            "[listPeople]\nstatus = 200\nbody = []\n\n[getPerson]\nbody = { id = 1, name = \"Ada\" }\n",
        )
        .unwrap();

        let ControllerModule::Static(controller) = CannedLoader.load(&path).unwrap() else {
            panic!("expected a static module");
        };
        assert_eq!(controller.len(), 2);
        assert!(matches!(controller.get("listPeople"), Some(Binding::Handler(_))));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CannedLoader.load(&path),
            Err(ControllerError::Parse { .. })
        ));
    }
}
