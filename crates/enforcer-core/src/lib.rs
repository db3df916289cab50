//! # Enforcer Core
//!
//! Core types shared by every Enforcer crate.
//!
//! - [`OperationCatalog`] - The boundary to a resolved API contract
//! - [`Operation`] / [`ResponseSpec`] - Immutable operation descriptions
//! - [`Schema`] - Opaque validate/serialize/random-value capability
//! - [`Contract`] - In-memory reference catalog built from [`Operation`]s
//! - [`EnforcerError`] / [`ErrorReport`] - Error taxonomy with nested reports
//! - [`RequestContext`] - Per-request state attached during dispatch
//! - [`EnforcerOptions`] - Recognized configuration options

#![doc(html_root_url = "https://docs.rs/enforcer-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
mod context;
pub mod contract;
mod error;
pub mod fixtures;
pub mod media;
mod mock;
mod operation;
mod options;
mod report;
pub mod schema;

pub use catalog::{
    ContractVersion, Extensions, OperationCatalog, ParsedRequest, RequestRejection,
    ResponseDraft, SerializedResponse, ValidationRequest,
};
pub use context::{RequestContext, RequestId};
pub use contract::{Contract, ContractBuilder};
pub use error::{EnforcerError, EnforcerResult, ErrorEnvelope};
pub use mock::{MockDecision, MockSource};
pub use operation::{
    status_from_key, Operation, OperationBuilder, Parameter, ParameterLocation, RequestBody,
    ResponseSpec,
};
pub use options::EnforcerOptions;
pub use report::ErrorReport;
pub use schema::{Generated, JsonSchema, Schema, SchemaRef, StringFormat};
