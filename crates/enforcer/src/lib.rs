//! # Enforcer
//!
//! **Contract enforcement for HTTP request handling**
//!
//! Enforcer sits between an HTTP host and user handlers and holds every
//! request and response to an API contract:
//!
//! - **Request validation** - Requests are matched to an operation and their
//!   parameters and body are validated and coerced ([`RequestValidator`])
//! - **Controller dispatch** - Operations are bound to handlers through
//!   contract extensions ([`enforcer_controllers::ControllerRegistry`])
//! - **Mocking** - A header, a query parameter or automatic mode produces
//!   schema-generated responses ([`MockEngine`])
//! - **Response serialization** - The first body a handler writes is
//!   validated and serialized against the declared response
//!   ([`ResponseSerializer`])
//!
//! ## Flow
//!
//! ```text
//! Request -> Validator -> Middleware chain -> Controller | Mock generator
//!                                                    |
//! Response <-------------- Serializer <--------------+
//! ```
//!
//! ## Example
//!
//! ```
//! use enforcer::prelude::*;
//! use enforcer_core::{fixtures::people_contract, ContractVersion};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let people = Controller::new().handler("getPerson", sync_handler(|exchange| {
//!     exchange.response.send(json!({ "id": 1, "name": "Ada" }))?;
//!     Ok(Flow::Halt)
//! }));
//!
//! let enforcer = Enforcer::builder(SharedContract::new(async {
//!     Ok(people_contract(ContractVersion::V2))
//! }))
//! .controllers(StaticControllers::new().controller("people", people))
//! .build()
//! .unwrap();
//!
//! // Only getPerson is bound, so the registry reports the other operations.
//! assert!(enforcer.ready().await.is_err());
//! # });
//! ```
//!
//! ## Host setup
//!
//! ```no_run
//! use enforcer::config::ConfigLoader;
//! use enforcer::core::{fixtures::people_contract, ContractVersion};
//! use enforcer::telemetry::{init_logging, init_metrics, render_metrics};
//! use enforcer::{Enforcer, SharedContract};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("enforcer.toml")?
//!     .load()?;
//! init_logging(&config.logging)?;
//! init_metrics()?;
//!
//! let enforcer = Enforcer::builder(SharedContract::new(async {
//!     Ok(people_contract(ContractVersion::V3 { minor: 0 }))
//! }))
//! .config(&config)
//! .build()?;
//! enforcer.ready().await?;
//!
//! // Serve `render_metrics()` from the host's own metrics route.
//! let _exposition = render_metrics();
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/enforcer/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod enforcer;
mod mock;
mod serializer;
mod state;
mod validator;

pub use crate::enforcer::{Dispatch, Enforcer, EnforcerBuilder, Registries};
pub use mock::{MockEngine, MockGenerator};
pub use serializer::ResponseSerializer;
pub use state::{ContractState, SharedContract};
pub use validator::{has_body, normalize, parse_query, RequestValidator, ValidationOutcome};

// Re-export the member crates
pub use enforcer_chain as chain;
pub use enforcer_config as config;
pub use enforcer_controllers as controllers;
pub use enforcer_core as core;
pub use enforcer_telemetry as telemetry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Dispatch, Enforcer, SharedContract};
    pub use enforcer_chain::{
        error_handler_fn, handler_fn, sync_handler, Exchange, Flow, HandlerEntry, HandlerResult,
    };
    pub use enforcer_controllers::{
        Controller, Dependencies, DirectoryControllers, FactoryControllers, StaticControllers,
    };
    pub use enforcer_core::{EnforcerError, EnforcerOptions, MockDecision, MockSource};
}
