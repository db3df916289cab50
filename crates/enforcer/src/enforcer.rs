//! The request entry point.
//!
//! Every request goes through the same steps:
//!
//! ```text
//! resolve contract -> build registry (once) -> validate
//!     Unmatched   -> fallthrough ? middleware then host : 404
//!     ClientError -> middleware with the validation error
//!     Matched     -> mock decision -> arm serializer
//!                 -> middleware + controller | mock generator
//! ```

use crate::mock::{MockEngine, MockGenerator};
use crate::serializer::ResponseSerializer;
use crate::state::{ContractState, SharedContract};
use crate::validator::{RequestValidator, ValidationOutcome};
use enforcer_chain::{
    error_response, BoxFuture, Completion, ErrorHandler, Exchange, Handler, HandlerChain,
    HandlerEntry, HandlerResult, Request, Response,
};
use enforcer_config::EnforcerConfig;
use enforcer_controllers::{
    BoundOperation, ControllerRegistry, ControllerSource, Dependencies, DirectoryControllers,
};
use enforcer_core::{EnforcerError, EnforcerOptions, ErrorReport, Operation, OperationCatalog};
use enforcer_telemetry::metrics::{describe_metrics, record_request, Outcome};
use http::header::ACCEPT;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

type RegistryCell = Arc<OnceCell<Result<Arc<ControllerRegistry>, ErrorReport>>>;

/// Controller registries shared between enforcers, keyed by source identity.
///
/// Enforcers built with the same cache and a source of the same identity load
/// controllers once. They are expected to serve the same contract.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    cells: Arc<Mutex<HashMap<String, RegistryCell>>>,
}

impl Registries {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, identity: &str) -> RegistryCell {
        Arc::clone(self.cells.lock().entry(identity.to_string()).or_default())
    }

    /// Returns the number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }
}

/// What the host should do with a request after [`Enforcer::handle`].
#[derive(Debug)]
pub enum Dispatch {
    /// The response is complete.
    Responded(Response),
    /// Nothing in the contract or the chain answered; the host takes over.
    Continue(Box<Exchange>),
    /// An error reached the end of the chain unresolved.
    Failed {
        /// The unresolved error.
        error: EnforcerError,
        /// The exchange, possibly with a status already set.
        exchange: Box<Exchange>,
    },
}

impl Dispatch {
    /// Converts the dispatch into a response the way a minimal host would.
    ///
    /// `Continue` becomes 404 unless a handler set a status. `Failed` becomes
    /// a JSON error envelope unless a response was already written.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Responded(response) => response,
            Self::Continue(exchange) => {
                if exchange.response.status().is_some() {
                    return exchange.response.into_response();
                }
                let error = EnforcerError::route_not_found(
                    exchange.request.method().clone(),
                    exchange.request.uri().path(),
                );
                let request_id = exchange.context.request_id().to_string();
                error_response(&error, Some(&request_id))
            }
            Self::Failed { error, exchange } => {
                if exchange.response.is_sent() {
                    return exchange.response.into_response();
                }
                let request_id = exchange.context.request_id().to_string();
                error_response(&error, Some(&request_id))
            }
        }
    }

    /// Returns `true` for [`Dispatch::Responded`].
    #[must_use]
    pub fn is_responded(&self) -> bool {
        matches!(self, Self::Responded(_))
    }

    /// Returns the unresolved error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EnforcerError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Runs the bound controller and marks the response as controller output.
struct ControllerHandler(BoundOperation);

impl Handler for ControllerHandler {
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        exchange.response.set_marker("controller");
        self.0.handler.call(exchange)
    }
}

struct Inner {
    contract: SharedContract,
    options: EnforcerOptions,
    mock: MockEngine,
    middleware: Vec<HandlerEntry>,
    source: Option<Arc<dyn ControllerSource>>,
    dependencies: Dependencies,
    registry: RegistryCell,
}

/// Contract enforcement in front of user handlers.
///
/// Cloning is cheap; clones share the contract, the registry and the
/// middleware.
///
/// # Example
///
/// ```
/// use enforcer::{Enforcer, SharedContract};
/// use enforcer_core::{fixtures::people_contract, ContractVersion};
///
/// # tokio_test::block_on(async {
/// let enforcer = Enforcer::builder(SharedContract::new(async {
///     Ok(people_contract(ContractVersion::V3 { minor: 0 }))
/// }))
/// .build()
/// .unwrap();
///
/// let request = http::Request::builder()
///     .uri("/people")
///     .header("x-mock", "")
///     .body(bytes::Bytes::new())
///     .unwrap();
/// let response = enforcer.handle(request).await.into_response();
/// assert_eq!(response.status(), 200);
/// assert_eq!(response.headers()["x-openapi-enforcer"], "mock");
/// # });
/// ```
#[derive(Clone)]
pub struct Enforcer {
    inner: Arc<Inner>,
}

impl Enforcer {
    /// Starts building an enforcer for a contract.
    #[must_use]
    pub fn builder(contract: SharedContract) -> EnforcerBuilder {
        EnforcerBuilder::new(contract)
    }

    /// Returns the effective options.
    #[must_use]
    pub fn options(&self) -> &EnforcerOptions {
        &self.inner.options
    }

    /// Returns the contract resolution state.
    #[must_use]
    pub fn contract_state(&self) -> ContractState {
        self.inner.contract.state()
    }

    /// Waits for the contract and the controller registry.
    ///
    /// Hosts call this at startup to surface contract and binding errors
    /// before serving traffic.
    ///
    /// # Errors
    ///
    /// Returns the contract or controller binding error.
    pub async fn ready(&self) -> Result<(), EnforcerError> {
        let catalog = self.inner.contract.resolve().await?;
        self.registry(&catalog).await.map(|_| ())
    }

    /// Processes one request.
    pub async fn handle(&self, request: Request) -> Dispatch {
        let mut exchange = Exchange::new(request);

        let catalog = match self.inner.contract.resolve().await {
            Ok(catalog) => catalog,
            Err(error) => return failed(error, exchange),
        };
        let registry = match self.registry(&catalog).await {
            Ok(registry) => registry,
            Err(error) => return failed(error, exchange),
        };

        exchange.context.set_property(
            self.inner.options.req_open_api_property.clone(),
            json!({
                "version": catalog.version().to_string(),
                "operations": catalog.operations().len(),
            }),
        );

        let outcome = RequestValidator::new(Arc::clone(&catalog)).validate(&mut exchange);
        let label = match &outcome {
            ValidationOutcome::Matched(_) => Outcome::Matched,
            ValidationOutcome::ClientError { .. } => Outcome::Invalid,
            ValidationOutcome::Unmatched => Outcome::Unmatched,
        };

        let (initial, terminal) = match outcome {
            ValidationOutcome::Unmatched if !self.inner.options.fallthrough => {
                exchange.response.set_status(StatusCode::NOT_FOUND);
                let error = EnforcerError::route_not_found(
                    exchange.request.method().clone(),
                    exchange.request.uri().path(),
                );
                record_request(label, exchange.context.elapsed());
                return failed(error, exchange);
            }
            ValidationOutcome::Unmatched => (None, None),
            ValidationOutcome::ClientError {
                operation,
                status,
                report,
            } => {
                if let Some(operation) = &operation {
                    self.attach_operation(&mut exchange, operation);
                }
                let operation_id = operation
                    .as_ref()
                    .and_then(|op| op.operation_id())
                    .map(ToString::to_string);
                (
                    Some(EnforcerError::request_validation(operation_id, status, report)),
                    None,
                )
            }
            ValidationOutcome::Matched(parsed) => (
                None,
                self.prepare(&mut exchange, &catalog, &registry, &parsed.operation),
            ),
        };

        let mut chain = HandlerChain::new(self.inner.middleware.clone())
            .with_marker_reset(self.inner.options.marker_reset);
        if let Some(terminal) = terminal {
            chain.push(terminal);
        }

        let completion = chain.run(&mut exchange, initial).await;
        record_request(label, exchange.context.elapsed());

        match completion {
            Completion::Halted => Dispatch::Responded(exchange.response.into_response()),
            Completion::Finished(None) if exchange.response.is_sent() => {
                Dispatch::Responded(exchange.response.into_response())
            }
            Completion::Finished(None) => Dispatch::Continue(Box::new(exchange)),
            Completion::Finished(Some(error)) => failed(error, exchange),
        }
    }

    /// Attaches the operation, decides on mocking, arms the serializer and
    /// picks the handler that serves the operation.
    fn prepare(
        &self,
        exchange: &mut Exchange,
        catalog: &Arc<dyn OperationCatalog>,
        registry: &ControllerRegistry,
        operation: &Arc<Operation>,
    ) -> Option<HandlerEntry> {
        self.attach_operation(exchange, operation);
        let bound = registry.lookup(operation);

        if let Some(decision) = self.inner.mock.decide(exchange, operation, bound.is_some()) {
            exchange.context.set_property(
                self.inner.options.req_mock_status_code_property.clone(),
                decision
                    .status_code
                    .clone()
                    .map_or(Value::Null, Value::String),
            );
            exchange.context.set_mock(decision);
        }

        let accept = exchange.request_header(ACCEPT.as_str()).map(ToString::to_string);
        exchange.response.arm(Box::new(ResponseSerializer::new(
            Arc::clone(catalog),
            Arc::clone(operation),
            accept,
        )));

        match bound {
            Some(bound) => {
                debug!(
                    controller = %bound.controller,
                    operation = %bound.operation,
                    "dispatching to controller"
                );
                Some(HandlerEntry::normal(ControllerHandler(bound.clone())))
            }
            None if exchange.context.mock().is_some() => {
                Some(HandlerEntry::normal(MockGenerator::new(Arc::clone(catalog))))
            }
            None => None,
        }
    }

    fn attach_operation(&self, exchange: &mut Exchange, operation: &Operation) {
        exchange.context.set_property(
            self.inner.options.req_operation_property.clone(),
            json!({
                "operationId": operation.operation_id(),
                "method": operation.method().as_str(),
                "path": operation.path(),
            }),
        );
    }

    async fn registry(
        &self,
        catalog: &Arc<dyn OperationCatalog>,
    ) -> Result<Arc<ControllerRegistry>, EnforcerError> {
        let built = self
            .inner
            .registry
            .get_or_init(|| {
                let inner = Arc::clone(&self.inner);
                let catalog = Arc::clone(catalog);
                async move {
                    // Directory sources read from disk while binding.
                    tokio::task::spawn_blocking(move || inner.build_registry(catalog.as_ref()))
                        .await
                        .unwrap_or_else(|err| {
                            Err(ErrorReport::new(format!(
                                "Controller registry build did not complete: {err}"
                            )))
                        })
                }
            })
            .await;

        built.clone().map_err(EnforcerError::controller_binding)
    }
}

impl Inner {
    fn build_registry(
        &self,
        catalog: &dyn OperationCatalog,
    ) -> Result<Arc<ControllerRegistry>, ErrorReport> {
        let Some(source) = &self.source else {
            return Ok(Arc::new(ControllerRegistry::empty()));
        };
        ControllerRegistry::build(catalog, source.as_ref(), &self.dependencies, &self.options)
            .map(Arc::new)
            .map_err(|err| {
                err.report()
                    .cloned()
                    .unwrap_or_else(|| ErrorReport::new(err.to_string()))
            })
    }
}

impl fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enforcer")
            .field("contract", &self.inner.contract)
            .field("options", &self.inner.options)
            .field("middleware", &self.inner.middleware.len())
            .field("source", &self.inner.source)
            .finish_non_exhaustive()
    }
}

fn failed(error: EnforcerError, exchange: Exchange) -> Dispatch {
    Dispatch::Failed {
        error,
        exchange: Box::new(exchange),
    }
}

/// Builder for [`Enforcer`].
pub struct EnforcerBuilder {
    contract: SharedContract,
    options: EnforcerOptions,
    automatic_mock: Option<bool>,
    middleware: Vec<HandlerEntry>,
    source: Option<Arc<dyn ControllerSource>>,
    dependencies: Dependencies,
    registries: Option<Registries>,
}

impl EnforcerBuilder {
    fn new(contract: SharedContract) -> Self {
        Self {
            contract,
            options: EnforcerOptions::default(),
            automatic_mock: None,
            middleware: Vec::new(),
            source: None,
            dependencies: Dependencies::new(),
            registries: None,
        }
    }

    /// Replaces the options.
    pub fn options(mut self, options: EnforcerOptions) -> Self {
        self.options = options;
        self
    }

    /// Applies loaded configuration: options, plus a directory controller
    /// source when one is configured.
    pub fn config(mut self, config: &EnforcerConfig) -> Self {
        self.options = config.enforcer.clone();
        if let Some(directory) = &config.controllers.directory {
            self.source = Some(Arc::new(DirectoryControllers::new(directory)));
        }
        self
    }

    /// Overrides automatic mocking.
    pub fn automatic_mock(mut self, enabled: bool) -> Self {
        self.automatic_mock = Some(enabled);
        self
    }

    /// Appends a middleware entry.
    pub fn middleware(mut self, entry: HandlerEntry) -> Self {
        self.middleware.push(entry);
        self
    }

    /// Appends a normal middleware handler.
    pub fn handler(self, handler: impl Handler) -> Self {
        self.middleware(HandlerEntry::normal(handler))
    }

    /// Appends an error handling middleware handler.
    pub fn error_handler(self, handler: impl ErrorHandler) -> Self {
        self.middleware(HandlerEntry::error_handling(handler))
    }

    /// Sets the controller source.
    pub fn controllers(mut self, source: impl ControllerSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Sets the values passed to controller factories.
    pub fn dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Shares controller registries with other enforcers.
    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = Some(registries);
        self
    }

    /// Validates the options and builds the enforcer.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Configuration`] for invalid options.
    pub fn build(self) -> Result<Enforcer, EnforcerError> {
        let mut options = self.options;
        if let Some(enabled) = self.automatic_mock {
            options.automatic_mock = enabled;
        }
        options.validate()?;

        let registry = match &self.source {
            Some(source) => self.registries.unwrap_or_default().cell(&source.identity()),
            None => RegistryCell::default(),
        };

        describe_metrics();
        info!(
            fallthrough = options.fallthrough,
            automatic_mock = options.automatic_mock,
            middleware = self.middleware.len(),
            controllers = self.source.as_ref().map(|s| s.identity()).unwrap_or_default(),
            "enforcer built"
        );

        Ok(Enforcer {
            inner: Arc::new(Inner {
                contract: self.contract,
                mock: MockEngine::new(&options),
                options,
                middleware: self.middleware,
                source: self.source,
                dependencies: self.dependencies,
                registry,
            }),
        })
    }
}

impl fmt::Debug for EnforcerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnforcerBuilder")
            .field("options", &self.options)
            .field("middleware", &self.middleware.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use enforcer_core::fixtures::people_contract;
    use enforcer_core::ContractVersion;
    use enforcer_chain::{sync_handler, Flow};

    fn contract() -> SharedContract {
        SharedContract::new(async { Ok(people_contract(ContractVersion::V2)) })
    }

    fn get(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_invalid_options_rejected() {
        let err = Enforcer::builder(contract())
            .options(EnforcerOptions {
                x_controller: String::new(),
                ..EnforcerOptions::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_context_properties() {
        let enforcer = Enforcer::builder(contract())
            .handler(sync_handler(|exchange| {
                let operation = exchange.context.property("operation").cloned();
                let mock = exchange.context.property("mockStatusCode").cloned();
                exchange.response.send_trusted(
                    StatusCode::OK,
                    json!({ "operation": operation, "mock": mock }),
                );
                Ok(Flow::Halt)
            }))
            .build()
            .unwrap();

        let request = http::Request::builder()
            .uri("/people/3")
            .header("x-mock", "404")
            .body(Bytes::new())
            .unwrap();
        let response = enforcer.handle(request).await.into_response();
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["operation"]["operationId"], "getPerson");
        assert_eq!(body["operation"]["path"], "/people/{id}");
        assert_eq!(body["mock"], "404");
    }

    #[tokio::test]
    async fn test_registries_share_one_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("people.json");
        std::fs::write(
            &file,
            r#"{ "listPeople": {}, "addPerson": {}, "getPerson": {}, "removePerson": {} }"#,
        )
        .unwrap();

        let registries = Registries::new();
        let build = || {
            Enforcer::builder(contract())
                .controllers(DirectoryControllers::new(dir.path()))
                .registries(registries.clone())
                .build()
                .unwrap()
        };
        let first = build();
        let second = build();
        assert_eq!(registries.len(), 1);

        first.ready().await.unwrap();
        std::fs::remove_file(&file).unwrap();
        second.ready().await.unwrap();

        let isolated = Enforcer::builder(contract())
            .controllers(DirectoryControllers::new(dir.path()))
            .build()
            .unwrap();
        let err = isolated.ready().await.unwrap_err();
        assert_eq!(err.error_code(), "CONTROLLER_BINDING_ERROR");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_requests_build_registry_once() {
        use enforcer_controllers::{Controller, FactoryControllers};
        use indexmap::IndexMap;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = FactoryControllers::new("app", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            let people = ["listPeople", "addPerson", "getPerson", "removePerson"]
                .into_iter()
                .fold(Controller::new(), |controller, operation_id| {
                    controller.handler(operation_id, sync_handler(|exchange| {
                        exchange.response.send(json!([]))?;
                        Ok(Flow::Halt)
                    }))
                });
            Some(IndexMap::from([("people".to_string(), people)]))
        });
        let enforcer = Enforcer::builder(contract())
            .controllers(source)
            .build()
            .unwrap();

        let dispatches = futures_util::future::join_all(
            (0..8).map(|_| enforcer.handle(get("/people"))),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for dispatch in dispatches {
            assert_eq!(dispatch.into_response().status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_fallthrough_continues() {
        let enforcer = Enforcer::builder(contract()).build().unwrap();
        match enforcer.handle(get("/pets")).await {
            Dispatch::Continue(exchange) => assert!(exchange.response.status().is_none()),
            other => panic!("expected Continue, got {other:?}"),
        }
    }
}
