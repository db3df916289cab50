//! End-to-end scenarios driven through the test client.

use enforcer::config::{ConfigFormat, ConfigLoader};
use enforcer::core::fixtures::people_contract;
use enforcer::core::{Contract, ContractVersion, EnforcerOptions, JsonSchema, Operation, ResponseSpec};
use enforcer::{Enforcer, SharedContract};
use enforcer_test::{Finish, TestClient};
use http::Method;
use serde_json::{json, Value};

fn client(version: ContractVersion) -> TestClient {
    TestClient::new(
        Enforcer::builder(SharedContract::new(async move { Ok(people_contract(version)) }))
            .build()
            .unwrap(),
    )
}

fn assert_people(body: &Value) {
    let people = body.as_array().expect("array body");
    for person in people {
        assert!(person["id"].as_i64().unwrap() >= 1);
        assert!(!person["name"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn empty_mock_header_generates_first_response() {
    let response = client(ContractVersion::V3 { minor: 0 })
        .get("/people")
        .header("x-mock", "")
        .send()
        .await;

    response
        .assert_status_code(200)
        .assert_marker("mock")
        .assert_header("content-type", "application/json");
    assert_people(&response.json_value().unwrap());
}

#[tokio::test]
async fn empty_mock_query_generates_first_response() {
    let response = client(ContractVersion::V2)
        .get("/people/4?x-mock")
        .send()
        .await;

    response.assert_status_code(200).assert_marker("mock");
    let person = response.json_value().unwrap();
    assert!(person["id"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn explicit_mock_status_picks_that_response() {
    let response = client(ContractVersion::V2)
        .post("/people")
        .header("x-mock", "201")
        .json(&json!({ "id": 1, "name": "Ada" }))
        .send()
        .await;
    response.assert_status_code(201).assert_marker("mock");
}

#[tokio::test]
async fn mock_without_responses_is_501() {
    let contract = Contract::builder("bare", ContractVersion::V2)
        .operation(Operation::builder(Method::GET, "/bare").operation_id("bare").build())
        .build();
    let client = TestClient::new(
        Enforcer::builder(SharedContract::new(async move { Ok(contract) }))
            .build()
            .unwrap(),
    );

    let response = client.get("/bare").header("x-mock", "").send().await;
    response
        .assert_status_code(501)
        .assert_no_header("x-openapi-enforcer")
        .assert_json_field("error.code", &json!("MOCK_GENERATION_ERROR"));
    assert_eq!(response.error_code(), Some("MOCK_GENERATION_ERROR"));
}

#[tokio::test]
async fn undeclared_mock_status_is_501() {
    client(ContractVersion::V2)
        .get("/people")
        .header("x-mock", "418")
        .send()
        .await
        .assert_status_code(501)
        .assert_body_contains("no response for status code");
}

#[tokio::test]
async fn automatic_mock_serves_unbound_operations() {
    let contract = Contract::builder("codes", ContractVersion::V2)
        .operation(
            Operation::builder(Method::GET, "/flag")
                .operation_id("flag")
                .response(ResponseSpec::new("200").schema(JsonSchema::boolean().shared()))
                .build(),
        )
        .build();
    let enforcer = Enforcer::builder(SharedContract::new(async move { Ok(contract) }))
        .automatic_mock(true)
        .build()
        .unwrap();
    let client = TestClient::new(enforcer);

    let response = client.get("/flag").send().await;
    response.assert_status_code(200).assert_marker("mock");
    assert!(response.json_value().unwrap().is_boolean());

    let opted_out = client.get("/flag").header("x-mock", "false").send().await;
    assert!(opted_out.continued());
    opted_out.assert_status_code(404);
}

#[tokio::test]
async fn unmatched_request_continues() {
    let response = client(ContractVersion::V2).get("/pets").send().await;
    assert_eq!(response.finish(), &Finish::Continued);
    response
        .assert_status_code(404)
        .assert_json_field("error.code", &json!("ROUTE_NOT_FOUND"));
}

#[tokio::test]
async fn invalid_body_is_rejected() {
    client(ContractVersion::V2)
        .post("/people")
        .json(&json!({ "name": "" }))
        .send()
        .await
        .assert_status_code(400)
        .assert_json_field("error.code", &json!("REQUEST_VALIDATION_ERROR"))
        .assert_body_contains("In body");
}

#[tokio::test]
async fn directory_controllers_from_configuration() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("people.json"),
        r#"{
            "listPeople": { "body": [{ "id": 1, "name": "Ada" }] },
            "addPerson": { "status": 201, "body": { "id": 2, "name": "Grace" } },
            "getPerson": [
                { "headers": { "x-source": "fixture" }, "continue": true },
                { "status": 200, "body": { "id": 1, "name": "Ada", "birthday": "1815-12-10" } }
            ],
            "removePerson": { "status": 204 }
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_string(
            &json!({ "controllers": { "directory": dir.path() } }).to_string(),
            ConfigFormat::Json,
        )
        .unwrap()
        .with_env_vars(vec![(
            "ENFORCER__ENFORCER__FALLTHROUGH".to_string(),
            "false".to_string(),
        )])
        .load()
        .unwrap();

    let enforcer = Enforcer::builder(SharedContract::new(async {
        Ok(people_contract(ContractVersion::V2))
    }))
    .config(&config)
    .build()
    .unwrap();
    enforcer.ready().await.unwrap();
    assert_eq!(enforcer.options(), &EnforcerOptions {
        fallthrough: false,
        ..EnforcerOptions::default()
    });
    let client = TestClient::new(enforcer);

    client
        .get("/people")
        .send()
        .await
        .assert_status_code(200)
        .assert_marker("controller")
        .assert_json_eq(&json!([{ "id": 1, "name": "Ada" }]));

    client
        .get("/people/1")
        .send()
        .await
        .assert_status_code(200)
        .assert_header("x-source", "fixture")
        .assert_json_field("birthday", &json!("1815-12-10"));

    client
        .delete("/people/1")
        .send()
        .await
        .assert_status_code(204);

    let missing = client.get("/pets").send().await;
    missing.assert_status_code(404);
    assert_eq!(missing.error_code(), Some("ROUTE_NOT_FOUND"));
}
