//! Recognized setup options.

use crate::error::EnforcerError;
use serde::{Deserialize, Serialize};

/// Options accepted when an enforcer is created.
///
/// Field names deserialize in camelCase, so the documented option names
/// (`mockHeader`, `reqOperationProperty`, ...) can be used verbatim in
/// configuration files.
///
/// # Example
///
/// ```
/// use enforcer_core::EnforcerOptions;
///
/// let options: EnforcerOptions =
///     serde_json::from_str(r#"{ "fallthrough": false, "mockHeader": "x-fake" }"#).unwrap();
/// assert!(!options.fallthrough);
/// assert_eq!(options.mock_header, "x-fake");
/// assert_eq!(options.mock_query, "x-mock");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EnforcerOptions {
    /// Continue to the host on unmatched routes instead of responding 404.
    pub fallthrough: bool,
    /// Header that requests a mock response.
    pub mock_header: String,
    /// Query parameter that requests a mock response.
    pub mock_query: String,
    /// Mock operations that have no controller even without a trigger.
    pub automatic_mock: bool,
    /// Context property holding the mock status code.
    pub req_mock_status_code_property: String,
    /// Context property holding contract details.
    pub req_open_api_property: String,
    /// Context property holding the matched operation.
    pub req_operation_property: String,
    /// Extension naming an operation's controller.
    pub x_controller: String,
    /// Extension naming the handler inside a controller.
    pub x_operation: String,
    /// Clear the marker header before each chain step.
    pub marker_reset: bool,
}

impl Default for EnforcerOptions {
    fn default() -> Self {
        Self {
            fallthrough: true,
            mock_header: "x-mock".to_string(),
            mock_query: "x-mock".to_string(),
            automatic_mock: false,
            req_mock_status_code_property: "mockStatusCode".to_string(),
            req_open_api_property: "openapi".to_string(),
            req_operation_property: "operation".to_string(),
            x_controller: "x-controller".to_string(),
            x_operation: "x-operation".to_string(),
            marker_reset: true,
        }
    }
}

impl EnforcerOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Configuration`] naming the first empty option.
    pub fn validate(&self) -> Result<(), EnforcerError> {
        let named = [
            ("mockHeader", &self.mock_header),
            ("mockQuery", &self.mock_query),
            ("reqMockStatusCodeProperty", &self.req_mock_status_code_property),
            ("reqOpenApiProperty", &self.req_open_api_property),
            ("reqOperationProperty", &self.req_operation_property),
            ("xController", &self.x_controller),
            ("xOperation", &self.x_operation),
        ];

        for (name, value) in named {
            if value.trim().is_empty() {
                return Err(EnforcerError::configuration(format!(
                    "option {name} must not be empty"
                )));
            }
        }

        if http::HeaderName::from_bytes(self.mock_header.as_bytes()).is_err() {
            return Err(EnforcerError::configuration(format!(
                "option mockHeader is not a valid header name: {}",
                self.mock_header
            )));
        }

        Ok(())
    }
}
