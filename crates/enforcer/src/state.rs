//! One-time contract resolution shared by every request.

use enforcer_core::{EnforcerError, OperationCatalog};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

type Resolved = Result<Arc<dyn OperationCatalog>, Arc<EnforcerError>>;

/// Observable state of contract resolution.
#[derive(Debug, Clone)]
pub enum ContractState {
    /// Resolution has not completed yet.
    Pending,
    /// The catalog is available.
    Ready(Arc<dyn OperationCatalog>),
    /// Resolution failed; every request reports this error.
    Failed(Arc<EnforcerError>),
}

impl ContractState {
    /// Returns `true` once the catalog is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// A contract resolution computed once and awaited by every request.
///
/// Cloning is cheap; clones share the same resolution.
///
/// # Example
///
/// ```
/// use enforcer::SharedContract;
/// use enforcer_core::{fixtures::people_contract, ContractVersion};
///
/// # tokio_test::block_on(async {
/// let contract = SharedContract::new(async {
///     Ok(people_contract(ContractVersion::V3 { minor: 0 }))
/// });
/// assert!(!contract.state().is_ready());
///
/// let catalog = contract.resolve().await.unwrap();
/// assert_eq!(catalog.operations().len(), 4);
/// assert!(contract.state().is_ready());
/// # });
/// ```
#[derive(Clone)]
pub struct SharedContract {
    inner: Shared<BoxFuture<'static, Resolved>>,
}

impl SharedContract {
    /// Wraps a pending contract resolution.
    pub fn new<F, C>(future: F) -> Self
    where
        F: Future<Output = Result<C, EnforcerError>> + Send + 'static,
        C: OperationCatalog + 'static,
    {
        let resolving = async move {
            match future.await {
                Ok(catalog) => {
                    info!(
                        version = %catalog.version(),
                        operations = catalog.operations().len(),
                        "contract resolved"
                    );
                    Ok(Arc::new(catalog) as Arc<dyn OperationCatalog>)
                }
                Err(err) => {
                    error!(error = %err, "contract resolution failed");
                    Err(Arc::new(err))
                }
            }
        };
        Self {
            inner: resolving.boxed().shared(),
        }
    }

    /// Wraps an already resolved catalog.
    pub fn ready(catalog: Arc<dyn OperationCatalog>) -> Self {
        Self {
            inner: futures_util::future::ready(Ok(catalog)).boxed().shared(),
        }
    }

    /// Waits for resolution.
    ///
    /// # Errors
    ///
    /// Returns a copy of the resolution error when the contract failed.
    pub async fn resolve(&self) -> Result<Arc<dyn OperationCatalog>, EnforcerError> {
        self.inner.clone().await.map_err(|err| replay(&err))
    }

    /// Returns the current state without waiting.
    #[must_use]
    pub fn state(&self) -> ContractState {
        match self.inner.peek() {
            None => ContractState::Pending,
            Some(Ok(catalog)) => ContractState::Ready(Arc::clone(catalog)),
            Some(Err(err)) => ContractState::Failed(Arc::clone(err)),
        }
    }
}

impl fmt::Debug for SharedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContract")
            .field("state", &self.state())
            .finish()
    }
}

/// Produces an owned copy of a shared resolution error.
fn replay(err: &EnforcerError) -> EnforcerError {
    match err {
        EnforcerError::Contract { message } => EnforcerError::contract(message.clone()),
        other => EnforcerError::contract(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enforcer_core::fixtures::people_contract;
    use enforcer_core::{Contract, ContractVersion};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let contract = SharedContract::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(people_contract(ContractVersion::V2))
        });

        let other = contract.clone();
        let (a, b) = tokio::join!(contract.resolve(), other.resolve());
        assert!(a.is_ok() && b.is_ok());
        contract.resolve().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_version_fails() {
        let contract = SharedContract::new(async {
            let builder = Contract::builder("broken", ContractVersion::V2)
                .detect_version(&json!({ "openapi": "three" }))?;
            Ok::<_, EnforcerError>(builder.build())
        });

        let err = contract.resolve().await.unwrap_err();
        assert_eq!(err.error_code(), "CONTRACT_ERROR");
        assert!(err.to_string().contains("malformed contract version"));
        assert!(matches!(contract.state(), ContractState::Failed(_)));

        let again = contract.resolve().await.unwrap_err();
        assert_eq!(again.to_string(), err.to_string());
    }

    #[tokio::test]
    async fn test_ready() {
        let contract = SharedContract::ready(Arc::new(people_contract(ContractVersion::V2)));
        assert!(contract.resolve().await.is_ok());
    }
}
