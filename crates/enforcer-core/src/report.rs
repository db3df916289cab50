//! Nested, multi-line error reports.
//!
//! Validation failures are rarely a single message. A request body can fail
//! in several properties at once, and a registry build can find problems in
//! several controllers. [`ErrorReport`] keeps those messages as a tree and
//! renders them as an indented description.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tree of error messages.
///
/// # Example
///
/// ```
/// use enforcer_core::ErrorReport;
///
/// let report = ErrorReport::new("Request has one or more errors")
///     .with_child(
///         ErrorReport::new("In query parameters")
///             .with_message("Expected an integer for \"limit\""),
///     );
///
/// assert_eq!(
///     report.to_string(),
///     "Request has one or more errors\n  In query parameters\n    Expected an integer for \"limit\""
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    header: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ErrorReport>,
}

impl ErrorReport {
    /// Creates a report with a header and no children.
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            children: Vec::new(),
        }
    }

    /// Returns the header line.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Returns the nested reports.
    #[must_use]
    pub fn children(&self) -> &[ErrorReport] {
        &self.children
    }

    /// Adds a nested report.
    #[must_use]
    pub fn with_child(mut self, child: ErrorReport) -> Self {
        self.children.push(child);
        self
    }

    /// Adds a leaf message.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with_child(ErrorReport::new(message))
    }

    /// Pushes a nested report in place.
    pub fn push(&mut self, child: ErrorReport) {
        self.children.push(child);
    }

    /// Pushes a leaf message in place.
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.children.push(ErrorReport::new(message));
    }

    /// Returns `true` when there are no nested reports.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Counts every leaf in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(ErrorReport::leaf_count).sum()
        }
    }

    /// Flattens the tree into indented lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.collect_lines(0, &mut lines);
        lines
    }

    fn collect_lines(&self, depth: usize, lines: &mut Vec<String>) {
        lines.push(format!("{}{}", "  ".repeat(depth), self.header));
        for child in &self.children {
            child.collect_lines(depth + 1, lines);
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

impl From<&str> for ErrorReport {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorReport {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_report_display() {
        let report = ErrorReport::new("something failed");
        assert_eq!(report.to_string(), "something failed");
        assert!(report.is_leaf());
    }

    #[test]
    fn test_nested_report_display() {
        let report = ErrorReport::new("root")
            .with_child(ErrorReport::new("a").with_message("a.1").with_message("a.2"))
            .with_message("b");

        assert_eq!(report.to_string(), "root\n  a\n    a.1\n    a.2\n  b");
        assert_eq!(report.leaf_count(), 3);
    }

    #[test]
    fn test_push_in_place() {
        let mut report = ErrorReport::new("root");
        report.push_message("first");
        report.push(ErrorReport::new("second"));
        assert_eq!(report.children().len(), 2);
        assert_eq!(report.children()[1].header(), "second");
    }

    #[test]
    fn test_report_serialization() {
        let report = ErrorReport::new("root").with_message("child");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["header"], "root");
        assert_eq!(json["children"][0]["header"], "child");

        let leaf = serde_json::to_value(ErrorReport::new("leaf")).unwrap();
        assert!(leaf.get("children").is_none());
    }
}
