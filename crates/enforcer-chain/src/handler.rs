//! Handler traits and their tagged registration.
//!
//! A handler either serves the request ([`Handler`]) or recovers from an
//! error raised earlier in the chain ([`ErrorHandler`]). The kind is chosen
//! explicitly when the handler is registered, by wrapping it in the matching
//! [`HandlerEntry`] variant.
//!
//! # Example
//!
//! ```
//! use enforcer_chain::{handler_fn, error_handler_fn, sync_handler, Flow, HandlerEntry};
//! use enforcer_core::EnforcerError;
//!
//! let entries = vec![
//!     HandlerEntry::normal(sync_handler(|exchange| {
//!         exchange.response.set_header("x-seen", "1")?;
//!         Ok(Flow::Next)
//!     })),
//!     HandlerEntry::normal(handler_fn(|exchange| {
//!         Box::pin(async move {
//!             exchange.response.send("done")?;
//!             Ok::<_, EnforcerError>(Flow::Halt)
//!         })
//!     })),
//!     HandlerEntry::error_handling(error_handler_fn(|error, exchange| {
//!         Box::pin(async move {
//!             exchange.response.set_status(error.status_code());
//!             exchange.response.send(error.to_string())?;
//!             Ok::<_, EnforcerError>(Flow::Halt)
//!         })
//!     })),
//! ];
//! assert_eq!(entries.len(), 3);
//! ```

use crate::exchange::Exchange;
use crate::types::{BoxFuture, HandlerResult};
use enforcer_core::EnforcerError;
use std::fmt;
use std::sync::Arc;

/// Serves a request.
pub trait Handler: Send + Sync + 'static {
    /// Handles the exchange.
    ///
    /// Returning `Ok(Flow::Next)` passes control on; `Err` routes the error
    /// to the next error handler.
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult>;
}

/// Recovers from an error raised earlier in the chain.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Handles the error.
    ///
    /// `Ok(Flow::Next)` clears the error and resumes normal handlers; `Err`
    /// passes an error on to the next error handler.
    fn call<'a>(
        &'a self,
        error: EnforcerError,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// A handler registered with its kind.
#[derive(Clone)]
pub enum HandlerEntry {
    /// Runs while no error is propagating.
    Normal(Arc<dyn Handler>),
    /// Runs only while an error is propagating.
    ErrorHandling(Arc<dyn ErrorHandler>),
}

impl HandlerEntry {
    /// Registers a normal handler.
    pub fn normal(handler: impl Handler) -> Self {
        Self::Normal(Arc::new(handler))
    }

    /// Registers an error handler.
    pub fn error_handling(handler: impl ErrorHandler) -> Self {
        Self::ErrorHandling(Arc::new(handler))
    }

    /// Returns `true` for error handlers.
    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        matches!(self, Self::ErrorHandling(_))
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(_) => f.write_str("HandlerEntry::Normal"),
            Self::ErrorHandling(_) => f.write_str("HandlerEntry::ErrorHandling"),
        }
    }
}

/// A handler built from an async closure.
pub struct HandlerFn<F> {
    func: F,
}

/// Wraps a closure returning a boxed future as a [`Handler`].
pub fn handler_fn<F>(func: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    HandlerFn { func }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        (self.func)(exchange)
    }
}

/// An error handler built from an async closure.
pub struct ErrorHandlerFn<F> {
    func: F,
}

/// Wraps a closure returning a boxed future as an [`ErrorHandler`].
pub fn error_handler_fn<F>(func: F) -> ErrorHandlerFn<F>
where
    F: for<'a> Fn(EnforcerError, &'a mut Exchange) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    ErrorHandlerFn { func }
}

impl<F> ErrorHandler for ErrorHandlerFn<F>
where
    F: for<'a> Fn(EnforcerError, &'a mut Exchange) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        error: EnforcerError,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.func)(error, exchange)
    }
}

/// A handler built from a synchronous closure.
pub struct SyncHandler<F> {
    func: F,
}

/// Wraps a synchronous closure as a [`Handler`].
pub fn sync_handler<F>(func: F) -> SyncHandler<F>
where
    F: Fn(&mut Exchange) -> HandlerResult + Send + Sync + 'static,
{
    SyncHandler { func }
}

impl<F> Handler for SyncHandler<F>
where
    F: Fn(&mut Exchange) -> HandlerResult + Send + Sync + 'static,
{
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move { (self.func)(exchange) })
    }
}
