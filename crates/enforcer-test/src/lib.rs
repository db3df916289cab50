//! # Enforcer Test
//!
//! In-memory testing for services built on Enforcer. Requests go straight
//! into [`enforcer::Enforcer::handle`] and the resulting dispatch is
//! collected into a [`TestResponse`] with assertion helpers.
//!
//! ```
//! use enforcer::{Enforcer, SharedContract};
//! use enforcer::core::{fixtures::people_contract, ContractVersion};
//! use enforcer_test::TestClient;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let client = TestClient::new(
//!     Enforcer::builder(SharedContract::new(async {
//!         Ok(people_contract(ContractVersion::V2))
//!     }))
//!     .build()
//!     .unwrap(),
//! );
//!
//! let response = client.post("/people").json(&json!({})).send().await;
//! response
//!     .assert_status_code(400)
//!     .assert_json_field("error.code", &json!("REQUEST_VALIDATION_ERROR"));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/enforcer-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::{Finish, TestResponse};
