//! Values handed to controller factories.
//!
//! # Example
//!
//! ```
//! use enforcer_controllers::Dependencies;
//! use std::sync::Arc;
//!
//! struct Store { name: &'static str }
//!
//! let mut deps = Dependencies::new();
//! deps.register(Arc::new(Store { name: "memory" }));
//!
//! let store: Arc<Store> = deps.resolve().unwrap();
//! assert_eq!(store.name, "memory");
//! ```

use crate::error::ControllerError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-keyed values shared with controller factories.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Dependencies {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value, replacing any previous value of that type.
    pub fn register<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.values.insert(TypeId::of::<T>(), value);
    }

    /// Registers a value, builder style.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.register(value);
        self
    }

    /// Resolves a value by type.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    /// Resolves a value or fails.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MissingDependency`] when the type is not registered.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ControllerError> {
        self.resolve().ok_or(ControllerError::MissingDependency {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Returns the number of registered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("count", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Clock(u64);

    #[test]
    fn test_resolve_registered() {
        let deps = Dependencies::new().with(Arc::new(Clock(7)));
        assert_eq!(*deps.resolve::<Clock>().unwrap(), Clock(7));
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_missing_dependency() {
        let deps = Dependencies::new();
        assert!(deps.is_empty());
        let err = deps.resolve_required::<Clock>().unwrap_err();
        assert!(err.to_string().contains("Clock"));
    }

    #[test]
    fn test_clones_share_values() {
        let deps = Dependencies::new().with(Arc::new(Clock(1)));
        let copy = deps.clone();
        assert!(Arc::ptr_eq(
            &deps.resolve::<Clock>().unwrap(),
            &copy.resolve::<Clock>().unwrap()
        ));
    }
}
