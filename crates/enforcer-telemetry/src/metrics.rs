//! Standard Enforcer metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `enforcer_requests_total` | Counter | `outcome` |
//! | `enforcer_dispatch_duration_seconds` | Histogram | `outcome` |
//! | `enforcer_mock_responses_total` | Counter | `source` |
//! | `enforcer_mock_failures_total` | Counter | - |
//! | `enforcer_response_validation_failures_total` | Counter | `operation` |
//!
//! Recording goes through the `metrics` facade, so nothing is collected
//! unless a recorder is installed. [`init_metrics`] installs a Prometheus
//! recorder without an HTTP listener; hosts expose [`render_metrics`] on a
//! route of their choice.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use ::metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Requests classified by the validator.
pub const REQUESTS_TOTAL: &str = "enforcer_requests_total";
/// Time spent in one dispatch.
pub const DISPATCH_DURATION: &str = "enforcer_dispatch_duration_seconds";
/// Generated mock responses.
pub const MOCK_RESPONSES_TOTAL: &str = "enforcer_mock_responses_total";
/// Mock requests that could not be satisfied.
pub const MOCK_FAILURES_TOTAL: &str = "enforcer_mock_failures_total";
/// Handler output rejected by the response serializer.
pub const RESPONSE_VALIDATION_FAILURES_TOTAL: &str = "enforcer_response_validation_failures_total";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// How the validator classified a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Matched and valid.
    Matched,
    /// Matched with invalid inputs.
    Invalid,
    /// No operation matched.
    Unmatched,
}

impl Outcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Invalid => "invalid",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Registers descriptions for every standard metric.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Requests seen by the validator, by outcome");
    describe_histogram!(
        DISPATCH_DURATION,
        Unit::Seconds,
        "Time from request arrival to the end of the handler chain"
    );
    describe_counter!(MOCK_RESPONSES_TOTAL, "Generated mock responses, by trigger source");
    describe_counter!(MOCK_FAILURES_TOTAL, "Mock requests that could not be generated");
    describe_counter!(
        RESPONSE_VALIDATION_FAILURES_TOTAL,
        "Handler responses rejected by the response serializer"
    );
}

/// Records a classified request and its dispatch time.
pub fn record_request(outcome: Outcome, duration: Duration) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(DISPATCH_DURATION, "outcome" => outcome.as_str()).record(duration.as_secs_f64());
}

/// Records a generated mock response.
pub fn record_mock(source: &'static str) {
    counter!(MOCK_RESPONSES_TOTAL, "source" => source).increment(1);
}

/// Records a failed mock generation.
pub fn record_mock_failure() {
    counter!(MOCK_FAILURES_TOTAL).increment(1);
}

/// Records a response rejected by the serializer.
pub fn record_response_validation_failure(operation: &str) {
    counter!(RESPONSE_VALIDATION_FAILURES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Installs a global Prometheus recorder and describes the standard metrics.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] when a recorder is already installed.
pub fn init_metrics() -> TelemetryResult<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = HANDLE.set(handle);
    describe_metrics();
    Ok(())
}

/// Renders collected metrics in the Prometheus text format.
///
/// Returns `None` until [`init_metrics`] has succeeded.
#[must_use]
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}
