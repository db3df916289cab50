//! Mock decisions and generated responses.
//!
//! [`MockEngine::decide`] inspects a matched request for a mock trigger. The
//! configured header wins over the configured query parameter, which wins
//! over automatic mocking. A trigger value of `false` opts the request out of
//! mocking altogether, and an empty trigger selects the first declared
//! response.
//!
//! When no controller serves the operation, [`MockGenerator`] produces a body
//! from the response schema. Generated values come straight from the schema
//! and are written without passing through the response serializer.

use crate::validator::parse_query;
use enforcer_chain::{BoxFuture, Exchange, Flow, Handler, HandlerResult};
use enforcer_core::{
    media, status_from_key, EnforcerError, EnforcerOptions, ErrorReport, MockDecision, MockSource,
    Operation, OperationCatalog,
};
use enforcer_telemetry::metrics::{record_mock, record_mock_failure};
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use http::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

const NO_RESPONSE: &str = "unable to mock: no response for status code";
const GENERATION_FAILED: &str = "unable to generate mock response";
const NO_SCHEMA: &str = "no schema associated with response";

/// Decides whether a request should be answered with a mock.
#[derive(Debug, Clone)]
pub struct MockEngine {
    header: String,
    query: String,
    automatic: bool,
}

impl MockEngine {
    /// Creates an engine from the trigger options.
    #[must_use]
    pub fn new(options: &EnforcerOptions) -> Self {
        Self {
            header: options.mock_header.to_ascii_lowercase(),
            query: options.mock_query.clone(),
            automatic: options.automatic_mock,
        }
    }

    /// Returns the mock decision for a matched request, if any.
    ///
    /// `has_controller` only matters for automatic mocking, which applies to
    /// operations no controller serves.
    #[must_use]
    pub fn decide(
        &self,
        exchange: &Exchange,
        operation: &Operation,
        has_controller: bool,
    ) -> Option<MockDecision> {
        let header = exchange.request_header(&self.header).map(str::trim);
        let query = parse_query(exchange.request.uri().query())
            .shift_remove(&self.query)
            .and_then(|values| values.into_iter().next());

        let (source, value) = match (header, query) {
            (Some(value), _) => (MockSource::Header, value.to_string()),
            (None, Some(value)) => (MockSource::Query, value.trim().to_string()),
            (None, None) if self.automatic && !has_controller => {
                (MockSource::Automatic, String::new())
            }
            (None, None) => return None,
        };

        if value.eq_ignore_ascii_case("false") {
            debug!(operation_id = %operation.display_name(), source = %source, "mock opted out");
            return None;
        }

        let explicit = !value.is_empty();
        let status_code = if explicit {
            Some(value)
        } else {
            operation.first_response_code().map(ToString::to_string)
        };
        let response = status_code.as_deref().and_then(|code| {
            operation
                .response_for_key(code)
                .or_else(|| status_from_key(code).and_then(|status| operation.response(status)))
                .cloned()
        });

        debug!(
            operation_id = %operation.display_name(),
            source = %source,
            status = status_code.as_deref().unwrap_or_default(),
            "mock requested"
        );

        Some(MockDecision {
            source,
            explicit,
            status_code,
            response,
        })
    }
}

/// Terminal handler that writes a generated mock response.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    catalog: Arc<dyn OperationCatalog>,
}

impl MockGenerator {
    /// Creates a generator for a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn OperationCatalog>) -> Self {
        Self { catalog }
    }

    fn generate(&self, exchange: &mut Exchange) -> HandlerResult {
        let Some(decision) = exchange.context.mock().cloned() else {
            return Ok(Flow::Next);
        };
        let operation = exchange
            .context
            .operation()
            .map(|op| op.display_name())
            .unwrap_or_default();

        let result = self.render(exchange, &decision);
        match result {
            Ok(()) => {
                record_mock(decision.source.as_str());
                Ok(Flow::Halt)
            }
            Err(report) => {
                warn!(operation_id = %operation, error = %report.header(), "mock generation failed");
                record_mock_failure();
                Err(EnforcerError::mock_generation(report))
            }
        }
    }

    fn render(&self, exchange: &mut Exchange, decision: &MockDecision) -> Result<(), ErrorReport> {
        let requested = decision.status_code.as_deref().unwrap_or("(none)");
        let response = decision.response.as_ref().ok_or_else(|| {
            ErrorReport::new(NO_RESPONSE)
                .with_message(format!("status code {requested} is not declared"))
        })?;
        let status = decision.status().unwrap_or(StatusCode::OK);

        let schema = if self.catalog.supports_content_negotiation() {
            let available = response.media_types();
            if available.is_empty() {
                None
            } else {
                let accept = exchange.request_header(ACCEPT.as_str());
                let chosen = media::negotiate(accept, &available).ok_or_else(|| {
                    ErrorReport::new(NO_SCHEMA).with_message(format!(
                        "none of {} is acceptable",
                        available.join(", ")
                    ))
                })?;
                let schema = response.content_for(&chosen).and_then(|(_, schema)| schema.cloned());
                if let Ok(value) = HeaderValue::from_str(&chosen) {
                    exchange.response.headers_mut().insert(CONTENT_TYPE, value);
                }
                schema
            }
        } else {
            response.body_schema().cloned()
        };

        let schema = schema.ok_or_else(|| {
            ErrorReport::new(NO_SCHEMA)
                .with_message(format!("response {} declares no body schema", response.status()))
        })?;

        let generated = schema
            .random_value()
            .map_err(|report| ErrorReport::new(GENERATION_FAILED).with_child(report))?;
        if !generated.warnings.is_empty() {
            return Err(generated
                .warnings
                .into_iter()
                .fold(ErrorReport::new(GENERATION_FAILED), ErrorReport::with_message));
        }

        exchange.response.set_marker("mock");
        exchange.response.send_trusted(status, generated.value);
        Ok(())
    }
}

impl Handler for MockGenerator {
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move { self.generate(exchange) })
    }
}
