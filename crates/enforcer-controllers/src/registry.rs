//! Operation to handler bindings.
//!
//! [`ControllerRegistry::build`] walks every operation of a catalog, works
//! out which controller and which operation name it is bound to, and
//! resolves the handler. Problems are collected rather than raised one by
//! one, so a single build reports every misconfigured operation.

use crate::dependencies::Dependencies;
use crate::module::Controller;
use crate::source::ControllerSource;
use enforcer_chain::Handler;
use enforcer_core::{EnforcerError, EnforcerOptions, ErrorReport, Operation, OperationCatalog};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Header of the aggregate binding report.
pub const BINDING_REPORT_HEADER: &str = "One or more controllers could not be bound";

/// A handler bound to an operation.
#[derive(Clone)]
pub struct BoundOperation {
    /// The controller name.
    pub controller: String,
    /// The operation name inside the controller.
    pub operation: String,
    /// The handler, a nested chain for handler lists.
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for BoundOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundOperation")
            .field("controller", &self.controller)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Read-only lookup from operation to bound handler.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    bindings: IndexMap<String, BoundOperation>,
}

impl ControllerRegistry {
    /// Creates a registry with no bindings.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Binds every operation of `catalog` to a handler from `source`.
    ///
    /// The controller name is taken from the operation, path and root
    /// extensions (first non-empty wins). The operation name is taken from the
    /// operation-level extension, else the operation id. Operations lacking
    /// either are left unbound.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::ControllerBinding`] listing every unresolved
    /// binding, grouped by controller.
    pub fn build(
        catalog: &dyn OperationCatalog,
        source: &dyn ControllerSource,
        deps: &Dependencies,
        options: &EnforcerOptions,
    ) -> Result<Self, EnforcerError> {
        source.prepare(deps).map_err(|e| {
            EnforcerError::controller_binding(
                ErrorReport::new(BINDING_REPORT_HEADER).with_message(e.to_string()),
            )
        })?;

        let mut controllers: IndexMap<String, Result<Arc<Controller>, String>> = IndexMap::new();
        let mut problems: IndexMap<String, ErrorReport> = IndexMap::new();
        let mut bindings = IndexMap::new();

        for operation in catalog.operations() {
            let Some(controller_name) = controller_name(catalog, &operation, &options.x_controller)
            else {
                debug!(operation = %operation.key(), "operation has no controller");
                continue;
            };
            let Some(operation_name) = operation
                .extension_str(&options.x_operation)
                .or_else(|| operation.operation_id())
                .map(ToString::to_string)
            else {
                debug!(operation = %operation.key(), "operation has no operation name");
                continue;
            };

            let controller = controllers
                .entry(controller_name.clone())
                .or_insert_with(|| {
                    source
                        .resolve(&controller_name)
                        .and_then(|module| module.instantiate(&controller_name, deps))
                        .map_err(|e| e.to_string())
                });

            let resolved = match controller {
                Err(message) => Err(message.clone()),
                Ok(controller) => match controller.get(&operation_name) {
                    None => Err(format!(
                        "controller has no handler named \"{operation_name}\""
                    )),
                    Some(binding) => binding.clone().into_handler(),
                },
            };

            match resolved {
                Ok(handler) => {
                    bindings.insert(
                        operation.key(),
                        BoundOperation {
                            controller: controller_name,
                            operation: operation_name,
                            handler,
                        },
                    );
                }
                Err(message) => problems
                    .entry(controller_name.clone())
                    .or_insert_with(|| ErrorReport::new(format!("Controller \"{controller_name}\"")))
                    .push(
                        ErrorReport::new(format!(
                            "Operation \"{operation_name}\" ({})",
                            operation.key()
                        ))
                        .with_message(message),
                    ),
            }
        }

        if !problems.is_empty() {
            let report = problems
                .into_values()
                .fold(ErrorReport::new(BINDING_REPORT_HEADER), ErrorReport::with_child);
            return Err(EnforcerError::controller_binding(report));
        }

        info!(
            source = %source.identity(),
            operations = bindings.len(),
            "controller registry built"
        );
        Ok(Self { bindings })
    }

    /// Returns the binding for an operation.
    #[must_use]
    pub fn lookup(&self, operation: &Operation) -> Option<&BoundOperation> {
        self.bindings.get(&operation.key())
    }

    /// Returns the number of bound operations.
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

/// Resolves the controller name by precedence: operation, path, root.
fn controller_name(
    catalog: &dyn OperationCatalog,
    operation: &Operation,
    key: &str,
) -> Option<String> {
    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };

    operation
        .extension_str(key)
        .map(ToString::to_string)
        .or_else(|| non_empty(catalog.path_extensions(operation.path()).and_then(|ext| ext.get(key))))
        .or_else(|| non_empty(catalog.root_extensions().get(key)))
}
