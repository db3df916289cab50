//! # Enforcer Chain
//!
//! The handler chain that global middleware, controller handlers and the
//! mock generator run in.
//!
//! - [`HandlerChain`] - Ordered runner with short-circuit and error routing
//! - [`HandlerEntry`] - Handlers tagged as normal or error handling at registration
//! - [`ResponseWriter`] - Response collector with a one-shot [`WriteInterceptor`]
//! - [`Exchange`] - Request, response and context of one request
//!
//! ## Control flow
//!
//! ```text
//! entries: [ N1, N2, E1, N3 ]          N = normal, E = error handling
//!
//! N1 -> Err(e) ──► skip N2 ──► E1(e) -> Ok(Next) ──► N3 -> Ok(Halt)
//! ```

#![doc(html_root_url = "https://docs.rs/enforcer-chain/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod exchange;
mod handler;
mod types;
mod writer;

pub use chain::{Completion, HandlerChain};
pub use exchange::Exchange;
pub use handler::{
    error_handler_fn, handler_fn, sync_handler, ErrorHandler, ErrorHandlerFn, Handler, HandlerEntry,
    HandlerFn, SyncHandler,
};
pub use types::{error_response, BoxFuture, Flow, HandlerResult, Request, Response};
pub use writer::{ResponseHead, ResponseWriter, WriteInterceptor, MARKER_HEADER};
