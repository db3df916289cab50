//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use enforcer::chain::{Response, MARKER_HEADER};
use enforcer::Dispatch;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// How the enforcer finished with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finish {
    /// A response was written.
    Responded,
    /// The request was handed back to the host.
    Continued,
    /// An error reached the end of the chain. Holds its error code.
    Failed(&'static str),
}

/// A collected response with helper methods for assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finish: Finish,
}

impl TestResponse {
    /// Collects a dispatch the way a minimal host would answer it.
    pub async fn from_dispatch(dispatch: Dispatch) -> Result<Self, TestError> {
        let finish = match &dispatch {
            Dispatch::Responded(_) => Finish::Responded,
            Dispatch::Continue(_) => Finish::Continued,
            Dispatch::Failed { error, .. } => Finish::Failed(error.error_code()),
        };
        Self::from_http(dispatch.into_response(), finish).await
    }

    async fn from_http(response: Response, finish: Finish) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
            finish,
        })
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns how the enforcer finished.
    #[must_use]
    pub fn finish(&self) -> &Finish {
        &self.finish
    }

    /// Returns `true` when the request was handed back to the host.
    #[must_use]
    pub fn continued(&self) -> bool {
        self.finish == Finish::Continued
    }

    /// Returns the error code of an unresolved error.
    #[must_use]
    pub fn error_code(&self) -> Option<&'static str> {
        match self.finish {
            Finish::Failed(code) => Some(code),
            _ => None,
        }
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the source marker: `controller` or `mock`.
    #[must_use]
    pub fn marker(&self) -> Option<&str> {
        self.header_str(MARKER_HEADER)
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {}, got {} with body {}",
            expected,
            self.status.as_u16(),
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}' mismatch");
        self
    }

    /// Asserts that a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        assert!(
            self.header(name).is_none(),
            "Header '{name}' should be absent, got {:?}",
            self.header(name)
        );
        self
    }

    /// Asserts the source marker.
    ///
    /// # Panics
    ///
    /// Panics if the marker doesn't match.
    pub fn assert_marker(&self, expected: &str) -> &Self {
        self.assert_header(MARKER_HEADER, expected)
    }

    /// Asserts that the body contains a substring.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't contain the substring.
    pub fn assert_body_contains(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        let body = String::from_utf8_lossy(&self.body);
        assert!(
            body.contains(expected),
            "Body should contain '{expected}', got: {body}"
        );
        self
    }

    /// Asserts that the JSON body equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    pub fn assert_json_eq(&self, expected: &Value) -> &Self {
        let actual = self
            .json_value()
            .unwrap_or_else(|e| panic!("Body should be valid JSON: {e}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts a field addressed by a dot path such as `error.code` or
    /// `items.0.name`.
    ///
    /// # Panics
    ///
    /// Panics if the field doesn't exist or doesn't match.
    pub fn assert_json_field(&self, path: &str, expected: &Value) -> &Self {
        let json = self
            .json_value()
            .unwrap_or_else(|e| panic!("Body should be valid JSON: {e}"));
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in: {json}"));
        assert_eq!(actual, expected, "JSON field '{path}' mismatch");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .field("finish", &self.finish)
            .finish()
    }
}

fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_path() {
        let value = json!({ "error": { "code": "X" }, "items": [{ "name": "Ada" }] });
        assert_eq!(json_path(&value, "error.code"), Some(&json!("X")));
        assert_eq!(json_path(&value, "items.0.name"), Some(&json!("Ada")));
        assert_eq!(json_path(&value, "items.3"), None);
    }
}
