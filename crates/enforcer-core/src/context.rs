//! Request context types.
//!
//! The [`RequestContext`] carries the per-request state the mediation layer
//! attaches while a request is dispatched: the matched operation, its parsed
//! inputs, the mock decision, and a named property bag exposed to handlers.

use crate::catalog::ParsedRequest;
use crate::mock::MockDecision;
use crate::operation::Operation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use enforcer_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state shared by the chain and handlers.
///
/// # Example
///
/// ```
/// use enforcer_core::RequestContext;
/// use serde_json::json;
///
/// let mut ctx = RequestContext::new();
/// ctx.set_property("mockStatusCode", json!("200"));
/// assert_eq!(ctx.property("mockStatusCode"), Some(&json!("200")));
///
/// ctx.insert(42_u32);
/// assert_eq!(ctx.get::<u32>(), Some(&42));
/// ```
pub struct RequestContext {
    request_id: RequestId,
    started_at: Instant,
    operation: Option<Arc<Operation>>,
    parsed: Option<ParsedRequest>,
    mock: Option<MockDecision>,
    properties: IndexMap<String, Value>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Instant::now(),
            operation: None,
            parsed: None,
            mock: None,
            properties: IndexMap::new(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Returns the targeted operation, set for both valid and invalid requests.
    #[must_use]
    pub fn operation(&self) -> Option<&Arc<Operation>> {
        self.operation.as_ref()
    }

    /// Sets the targeted operation.
    pub fn set_operation(&mut self, operation: Arc<Operation>) {
        self.operation = Some(operation);
    }

    /// Returns the parsed inputs of a valid request.
    #[must_use]
    pub fn parsed(&self) -> Option<&ParsedRequest> {
        self.parsed.as_ref()
    }

    /// Attaches parsed inputs and their operation.
    pub fn set_parsed(&mut self, parsed: ParsedRequest) {
        self.operation = Some(Arc::clone(&parsed.operation));
        self.parsed = Some(parsed);
    }

    /// Returns the mock decision, if a mock was requested.
    #[must_use]
    pub fn mock(&self) -> Option<&MockDecision> {
        self.mock.as_ref()
    }

    /// Attaches a mock decision.
    pub fn set_mock(&mut self, decision: MockDecision) {
        self.mock = Some(decision);
    }

    /// Returns a named property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a named property.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Returns every named property.
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Stores a typed value, replacing any previous value of that type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed value.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Returns a mutable typed value.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("operation", &self.operation.as_ref().map(|op| op.key()))
            .field("mock", &self.mock)
            .field("properties", &self.properties)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use http::Method;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_set_parsed_sets_operation() {
        let operation = Arc::new(Operation::builder(Method::GET, "/people").build());
        let mut ctx = RequestContext::new();
        assert!(ctx.operation().is_none());

        ctx.set_parsed(ParsedRequest::new(Arc::clone(&operation)));
        assert_eq!(ctx.operation().unwrap().key(), "GET /people");
        assert!(ctx.parsed().is_some());
    }

    #[test]
    fn test_mock_decision() {
        let mut ctx = RequestContext::new();
        ctx.set_mock(MockDecision {
            source: MockSource::Header,
            explicit: false,
            status_code: Some("200".to_string()),
            response: None,
        });
        assert_eq!(ctx.mock().unwrap().source, MockSource::Header);
    }

    #[test]
    fn test_typed_extensions() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = RequestContext::new();
        assert!(ctx.get::<Tenant>().is_none());
        ctx.insert(Tenant("acme"));
        assert_eq!(ctx.get::<Tenant>(), Some(&Tenant("acme")));
        if let Some(tenant) = ctx.get_mut::<Tenant>() {
            tenant.0 = "globex";
        }
        assert_eq!(ctx.get::<Tenant>(), Some(&Tenant("globex")));
    }

    #[test]
    fn test_debug_hides_extension_values() {
        let mut ctx = RequestContext::new();
        ctx.insert(1_u8);
        let debug = format!("{ctx:?}");
        assert!(debug.contains("extensions: 1"));
    }
}
