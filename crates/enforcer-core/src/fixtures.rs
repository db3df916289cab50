//! Contracts used across the test suites.
//!
//! # Example
//!
//! ```
//! use enforcer_core::fixtures::people_contract;
//! use enforcer_core::{ContractVersion, OperationCatalog};
//!
//! let contract = people_contract(ContractVersion::V3 { minor: 0 });
//! assert_eq!(contract.operations().len(), 4);
//! ```

use crate::catalog::ContractVersion;
use crate::contract::Contract;
use crate::operation::{Operation, Parameter, RequestBody, ResponseSpec};
use crate::schema::{JsonSchema, SchemaRef};
use http::Method;

/// The `Person` object schema.
///
/// `id` (integer, at least 1) and `name` (non-empty string) are required;
/// `birthday` is an optional date.
#[must_use]
pub fn person_schema() -> JsonSchema {
    JsonSchema::object(vec![
        ("id", JsonSchema::integer().minimum_int(1).required()),
        ("name", JsonSchema::string().min_length(1).required()),
        ("birthday", JsonSchema::date()),
    ])
}

/// Creates the people contract.
///
/// Every operation is bound to the `people` controller through a root
/// `x-controller` extension:
/// - `listPeople` - GET /people (`limit` query, 200 array of people)
/// - `addPerson` - POST /people (required body, 201 person, 400 no body)
/// - `getPerson` - GET /people/{id} (200 person, 404 no body)
/// - `deletePerson` - DELETE /people/{id}, bound as `removePerson`, 204
///
/// Version 3 documents also declare `text/plain` for `listPeople`.
#[must_use]
pub fn people_contract(version: ContractVersion) -> Contract {
    let person = person_schema().shared();
    let people = JsonSchema::array(person_schema()).shared();
    let v3 = version.supports_content_negotiation();

    let body = |schema: &SchemaRef| {
        if v3 {
            RequestBody::with_content()
                .content("application/json", schema.clone())
                .required()
        } else {
            RequestBody::new(schema.clone()).required()
        }
    };
    let response = |status: &str, schema: &SchemaRef| {
        if v3 {
            ResponseSpec::new(status).content("application/json", Some(schema.clone()))
        } else {
            ResponseSpec::new(status).schema(schema.clone())
        }
    };

    let mut list = response("200", &people).description("Every person");
    if v3 {
        list = list.content("text/plain", Some(JsonSchema::string().shared()));
    }

    Contract::builder("people", version)
        .info_version("1.0.0")
        .extension("x-controller", "people")
        .operation(
            Operation::builder(Method::GET, "/people")
                .operation_id("listPeople")
                .parameter(Parameter::query(
                    "limit",
                    JsonSchema::integer().minimum_int(1).maximum_int(100).shared(),
                ))
                .response(list)
                .build(),
        )
        .operation(
            Operation::builder(Method::POST, "/people")
                .operation_id("addPerson")
                .request_body(body(&person))
                .response(response("201", &person))
                .response(ResponseSpec::new("400").description("Invalid person"))
                .build(),
        )
        .operation(
            Operation::builder(Method::GET, "/people/{id}")
                .operation_id("getPerson")
                .parameter(Parameter::path(
                    "id",
                    JsonSchema::integer().minimum_int(1).shared(),
                ))
                .response(response("200", &person))
                .response(ResponseSpec::new("404").description("No such person"))
                .build(),
        )
        .operation(
            Operation::builder(Method::DELETE, "/people/{id}")
                .operation_id("deletePerson")
                .extension("x-operation", "removePerson")
                .parameter(Parameter::path(
                    "id",
                    JsonSchema::integer().minimum_int(1).shared(),
                ))
                .response(ResponseSpec::new("204"))
                .build(),
        )
        .build()
}
