//! Mock decisions attached to a request.

use crate::operation::{status_from_key, ResponseSpec};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What triggered a mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockSource {
    /// The configured mock header.
    Header,
    /// The configured mock query parameter.
    Query,
    /// Automatic mocking for operations without a controller.
    Automatic,
}

impl MockSource {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Query => "query",
            Self::Automatic => "automatic",
        }
    }
}

impl fmt::Display for MockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of mock detection for one request.
///
/// A decision is attached to the request context before any handler runs, so
/// a controller serving the operation can consult the requested status.
#[derive(Debug, Clone)]
pub struct MockDecision {
    /// What triggered the mock.
    pub source: MockSource,
    /// Whether the trigger carried a status code.
    pub explicit: bool,
    /// The resolved status key, if any.
    pub status_code: Option<String>,
    /// The declared response for that status, if any.
    pub response: Option<ResponseSpec>,
}

impl MockDecision {
    /// Returns the resolved status. `default` maps to 200.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status_code.as_deref().and_then(status_from_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_resolution() {
        let decision = MockDecision {
            source: MockSource::Query,
            explicit: true,
            status_code: Some("default".to_string()),
            response: None,
        };
        assert_eq!(decision.status(), Some(StatusCode::OK));

        let decision = MockDecision {
            status_code: None,
            ..decision
        };
        assert_eq!(decision.status(), None);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(MockSource::Header.to_string(), "header");
        assert_eq!(
            serde_json::to_value(MockSource::Automatic).unwrap(),
            serde_json::json!("automatic")
        );
    }
}
