//! The ordered handler runner.
//!
//! [`HandlerChain`] runs a queue of [`HandlerEntry`] values front to back:
//!
//! - while no error is propagating, normal handlers run and error handlers
//!   are skipped
//! - while an error is propagating, error handlers run and normal handlers
//!   are skipped
//! - a handler that returns `Err` or panics starts error propagation
//! - an error handler that returns `Ok(Flow::Next)` ends it
//! - `Ok(Flow::Halt)` stops the chain
//!
//! When the queue is exhausted the chain finishes with whatever error is
//! left, so control returns to the caller.

use crate::exchange::Exchange;
use crate::handler::{ErrorHandler, Handler, HandlerEntry};
use crate::types::{BoxFuture, Flow, HandlerResult};
use enforcer_core::EnforcerError;
use futures_util::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// How a chain run ended.
#[derive(Debug)]
pub enum Completion {
    /// A handler stopped the chain.
    Halted,
    /// Every handler was visited. Carries the unresolved error, if any.
    Finished(Option<EnforcerError>),
}

impl Completion {
    /// Returns `true` when a handler stopped the chain.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }

    /// Returns the unresolved error, if any.
    #[must_use]
    pub fn into_error(self) -> Option<EnforcerError> {
        match self {
            Self::Halted => None,
            Self::Finished(error) => error,
        }
    }
}

/// An ordered sequence of handlers run as one logical chain.
///
/// # Example
///
/// ```
/// use enforcer_chain::{sync_handler, Completion, Exchange, Flow, HandlerChain, HandlerEntry};
///
/// # tokio_test::block_on(async {
/// let chain = HandlerChain::new(vec![
///     HandlerEntry::normal(sync_handler(|_| Ok(Flow::Next))),
///     HandlerEntry::normal(sync_handler(|exchange| {
///         exchange.response.send("hi")?;
///         Ok(Flow::Halt)
///     })),
/// ]);
///
/// let mut exchange = Exchange::new(http::Request::new(bytes::Bytes::new()));
/// let completion = chain.run(&mut exchange, None).await;
/// assert!(completion.is_halted());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandlerChain {
    entries: Vec<HandlerEntry>,
    marker_reset: bool,
}

impl HandlerChain {
    /// Creates a chain from ordered entries.
    #[must_use]
    pub fn new(entries: Vec<HandlerEntry>) -> Self {
        Self {
            entries,
            marker_reset: false,
        }
    }

    /// Clears the marker header before each dispatched step.
    #[must_use]
    pub fn with_marker_reset(mut self, enabled: bool) -> Self {
        self.marker_reset = enabled;
        self
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: HandlerEntry) {
        self.entries.push(entry);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the chain has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the chain, starting with `initial` as the propagating error.
    pub async fn run(&self, exchange: &mut Exchange, initial: Option<EnforcerError>) -> Completion {
        let mut queue: VecDeque<&HandlerEntry> = self.entries.iter().collect();
        let mut error = initial;

        while let Some(entry) = queue.pop_front() {
            let outcome = match (entry, error.take()) {
                (HandlerEntry::Normal(handler), None) => {
                    self.reset_marker(exchange);
                    let ex = &mut *exchange;
                    guarded(move || handler.call(ex)).await
                }
                (HandlerEntry::ErrorHandling(handler), Some(err)) => {
                    self.reset_marker(exchange);
                    let ex = &mut *exchange;
                    guarded(move || handler.call(err, ex)).await
                }
                (_, pending) => {
                    error = pending;
                    continue;
                }
            };

            match outcome {
                Ok(Flow::Next) => {}
                Ok(Flow::Halt) => return Completion::Halted,
                Err(err) => {
                    debug!(error = %err, "handler raised an error");
                    error = Some(err);
                }
            }
        }

        Completion::Finished(error)
    }

    fn reset_marker(&self, exchange: &mut Exchange) {
        if self.marker_reset {
            exchange.response.clear_marker();
        }
    }
}

impl Handler for HandlerChain {
    fn call<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match self.run(exchange, None).await {
                Completion::Halted => Ok(Flow::Halt),
                Completion::Finished(None) => Ok(Flow::Next),
                Completion::Finished(Some(error)) => Err(error),
            }
        })
    }
}

/// Starts and awaits a handler, turning panics into handler errors.
async fn guarded<'a, F>(start: F) -> HandlerResult
where
    F: FnOnce() -> BoxFuture<'a, HandlerResult>,
{
    let future = match std::panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(future) => future,
        Err(payload) => return Err(panic_error(&*payload)),
    };

    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_error(&*payload)))
}

fn panic_error(payload: &(dyn Any + Send)) -> EnforcerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    warn!(panic = %message, "handler panicked");
    EnforcerError::handler(message)
}
