//! Controllers and their operation bindings.

use crate::dependencies::Dependencies;
use crate::error::ControllerError;
use enforcer_chain::{Handler, HandlerChain, HandlerEntry};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// What a controller exposes under one operation name.
#[derive(Clone)]
pub enum Binding {
    /// A single handler.
    Handler(Arc<dyn Handler>),
    /// Several handlers run in order as a nested chain.
    Handlers(Vec<HandlerEntry>),
    /// A value that is neither a handler nor a list of handlers.
    Invalid(String),
}

impl Binding {
    /// Converts the binding into a callable handler.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for invalid bindings and empty
    /// handler lists.
    pub fn into_handler(self) -> Result<Arc<dyn Handler>, String> {
        match self {
            Self::Handler(handler) => Ok(handler),
            Self::Handlers(entries) if entries.is_empty() => {
                Err("handler list is empty".to_string())
            }
            Self::Handlers(entries) => Ok(Arc::new(HandlerChain::new(entries))),
            Self::Invalid(description) => Err(format!(
                "expected a handler or a list of handlers, found {description}"
            )),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Binding::Handler"),
            Self::Handlers(entries) => write!(f, "Binding::Handlers({})", entries.len()),
            Self::Invalid(description) => write!(f, "Binding::Invalid({description:?})"),
        }
    }
}

/// Operation bindings of one controller, keyed by operation name.
///
/// # Example
///
/// ```
/// use enforcer_chain::{sync_handler, Flow};
/// use enforcer_controllers::Controller;
///
/// let people = Controller::new()
///     .handler("listPeople", sync_handler(|exchange| {
///         exchange.response.send(serde_json::json!([]))?;
///         Ok(Flow::Halt)
///     }));
///
/// assert!(people.get("listPeople").is_some());
/// assert!(people.get("addPerson").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Controller {
    bindings: IndexMap<String, Binding>,
}

impl Controller {
    /// Creates a controller with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a single handler.
    #[must_use]
    pub fn handler(self, operation: impl Into<String>, handler: impl Handler) -> Self {
        self.binding(operation, Binding::Handler(Arc::new(handler)))
    }

    /// Binds a list of handlers.
    #[must_use]
    pub fn handlers(self, operation: impl Into<String>, entries: Vec<HandlerEntry>) -> Self {
        self.binding(operation, Binding::Handlers(entries))
    }

    /// Binds an arbitrary value.
    #[must_use]
    pub fn binding(mut self, operation: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(operation.into(), binding);
        self
    }

    /// Looks up a binding.
    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&Binding> {
        self.bindings.get(operation)
    }

    /// Returns the bound operation names.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Builds a controller from dependencies.
pub type ControllerFactory = Arc<dyn Fn(&Dependencies) -> Option<Controller> + Send + Sync>;

/// A resolved controller module.
#[derive(Clone)]
pub enum ControllerModule {
    /// A plain mapping of operation names to bindings.
    Static(Arc<Controller>),
    /// A function producing the mapping from dependencies.
    Factory(ControllerFactory),
}

impl ControllerModule {
    /// Wraps a plain controller.
    #[must_use]
    pub fn from_controller(controller: Controller) -> Self {
        Self::Static(Arc::new(controller))
    }

    /// Wraps a factory function.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Dependencies) -> Option<Controller> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Produces the controller, invoking the factory if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::EmptyFactory`] when a factory returns nothing.
    pub fn instantiate(
        &self,
        name: &str,
        deps: &Dependencies,
    ) -> Result<Arc<Controller>, ControllerError> {
        match self {
            Self::Static(controller) => Ok(Arc::clone(controller)),
            Self::Factory(factory) => factory(deps).map(Arc::new).ok_or_else(|| {
                ControllerError::EmptyFactory {
                    name: name.to_string(),
                }
            }),
        }
    }
}

impl fmt::Debug for ControllerModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(controller) => f.debug_tuple("Static").field(controller).finish(),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl From<Controller> for ControllerModule {
    fn from(controller: Controller) -> Self {
        Self::from_controller(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enforcer_chain::{sync_handler, Flow};

    fn noop() -> impl Handler {
        sync_handler(|_| Ok(Flow::Next))
    }

    #[test]
    fn test_binding_conversion() {
        assert!(Binding::Handler(Arc::new(noop())).into_handler().is_ok());
        assert!(Binding::Handlers(vec![HandlerEntry::normal(noop())])
            .into_handler()
            .is_ok());
        assert_eq!(
            Binding::Handlers(Vec::new()).into_handler().err().unwrap(),
            "handler list is empty"
        );
        assert_eq!(
            Binding::Invalid("a number".to_string())
                .into_handler()
                .err()
                .unwrap(),
            "expected a handler or a list of handlers, found a number"
        );
    }

    #[test]
    fn test_factory_receives_dependencies() {
        struct Prefix(&'static str);

        let module = ControllerModule::factory(|deps| {
            let prefix = deps.resolve::<Prefix>()?;
            Some(Controller::new().handler(format!("{}List", prefix.0), noop()))
        });

        let deps = Dependencies::new().with(Arc::new(Prefix("people")));
        let controller = module.instantiate("people", &deps).unwrap();
        assert_eq!(controller.operations().collect::<Vec<_>>(), vec!["peopleList"]);

        let err = module.instantiate("people", &Dependencies::new()).unwrap_err();
        assert!(matches!(err, ControllerError::EmptyFactory { .. }));
    }
}
