//! In-memory client driving an [`Enforcer`].

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use bytes::Bytes;
use enforcer::{Dispatch, Enforcer};
use http::Method;
use serde::Serialize;

/// Sends requests straight into an [`Enforcer`] without a server.
///
/// # Example
///
/// ```
/// use enforcer::{Enforcer, SharedContract};
/// use enforcer::core::{fixtures::people_contract, ContractVersion};
/// use enforcer_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let enforcer = Enforcer::builder(SharedContract::new(async {
///     Ok(people_contract(ContractVersion::V2))
/// }))
/// .build()
/// .unwrap();
///
/// let client = TestClient::new(enforcer);
/// client
///     .get("/people/1")
///     .header("x-mock", "")
///     .send()
///     .await
///     .assert_status_code(200)
///     .assert_marker("mock");
/// # });
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    enforcer: Enforcer,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for an enforcer.
    pub fn new(enforcer: Enforcer) -> Self {
        Self {
            enforcer,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the enforcer under test.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    /// Creates a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Creates a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Creates a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Creates a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Creates a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Creates a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    async fn dispatch(&self, request: TestRequest) -> Result<Dispatch, TestError> {
        Ok(self.enforcer.handle(request.into_http_request()?).await)
    }
}

/// A request builder bound to a [`TestClient`].
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name, value));
        Self { client, builder }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the Accept header.
    pub fn accept(mut self, accept: impl AsRef<str>) -> Self {
        self.builder = self.builder.accept(accept);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request and collects the response.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("request should succeed: {e}"),
        }
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let dispatch = self.dispatch().await?;
        TestResponse::from_dispatch(dispatch).await
    }

    /// Sends the request and returns the raw [`Dispatch`].
    pub async fn dispatch(self) -> Result<Dispatch, TestError> {
        let request = self.builder.build()?;
        self.client.dispatch(request).await
    }
}
