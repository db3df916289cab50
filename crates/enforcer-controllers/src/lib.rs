//! # Enforcer Controllers
//!
//! Binds contract operations to user handlers.
//!
//! - [`ControllerSource`] - Resolves controller names ([`StaticControllers`],
//!   [`DirectoryControllers`], [`FactoryControllers`])
//! - [`Controller`] / [`Binding`] - Operation name to handler mapping
//! - [`ControllerRegistry`] - Operation to handler lookup with aggregated
//!   binding errors
//! - [`CannedResponse`] - Handlers defined in JSON or TOML files
//!
//! ## Example
//!
//! ```
//! use enforcer_chain::{sync_handler, Flow};
//! use enforcer_controllers::{Controller, ControllerRegistry, Dependencies, StaticControllers};
//! use enforcer_core::{fixtures::people_contract, ContractVersion, EnforcerOptions};
//!
//! let list = || sync_handler(|exchange| {
//!     exchange.response.send(serde_json::json!([]))?;
//!     Ok(Flow::Halt)
//! });
//! let people = Controller::new()
//!     .handler("listPeople", list())
//!     .handler("addPerson", list())
//!     .handler("getPerson", list())
//!     .handler("removePerson", list());
//! let source = StaticControllers::new().controller("people", people);
//!
//! let registry = ControllerRegistry::build(
//!     &people_contract(ContractVersion::V2),
//!     &source,
//!     &Dependencies::new(),
//!     &EnforcerOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(registry.len(), 4);
//! ```

#![doc(html_root_url = "https://docs.rs/enforcer-controllers/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod canned;
mod dependencies;
mod error;
mod module;
mod registry;
mod source;

pub use canned::{binding_from_value, controller_from_value, CannedLoader, CannedResponse, ModuleLoader};
pub use dependencies::Dependencies;
pub use error::{ControllerError, ControllerResult};
pub use module::{Binding, Controller, ControllerFactory, ControllerModule};
pub use registry::{BoundOperation, ControllerRegistry, BINDING_REPORT_HEADER};
pub use source::{ControllerSource, DirectoryControllers, FactoryControllers, StaticControllers};
