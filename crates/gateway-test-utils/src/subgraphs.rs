//! Mock subgraphs backed by wiremock.
//!
//! A `MockSubgraph` answers the service definition query with its SDL and
//! any other operation with whatever was registered for it.

use gateway::federation::subgraph::SERVICE_DEFINITION_QUERY;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GRAPHQL_PATH: &str = "/graphql";

/// SDL of the accounts test service.
pub const ACCOUNTS_SDL: &str = r#"
    extend type Query { me: User }
    type User @key(fields: "id") { id: ID! username: String }
"#;

/// SDL of the products test service.
pub const PRODUCTS_SDL: &str = r#"
    extend type Query { topProducts(first: Int = 5): [Product] }
    extend type Mutation { createProduct(upc: String!, name: String): Product }
    type Product @key(fields: "upc") { upc: String! name: String price: Int }
"#;

/// SDL of the reviews test service.
pub const REVIEWS_SDL: &str = r#"
    extend type Query { reviews(first: Int): [Review] }
    type Review { id: ID! body: String }
"#;

/// A wiremock server posing as a federated GraphQL service.
pub struct MockSubgraph {
    server: MockServer,
}

impl MockSubgraph {
    /// Start a subgraph publishing `sdl`.
    pub async fn start(sdl: &str) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains(SERVICE_DEFINITION_QUERY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "_service": { "sdl": sdl } }
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Self { server }
    }

    /// Start a server with nothing mounted; every request gets a 404.
    pub async fn start_without_sdl() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start three subgraphs, one per SDL, in service order.
    pub async fn start_three(sdls: [&str; 3]) -> [Self; 3] {
        let [a, b, c] = sdls;
        [Self::start(a).await, Self::start(b).await, Self::start(c).await]
    }

    /// Start the accounts, products and reviews test services.
    pub async fn start_default() -> [Self; 3] {
        Self::start_three([ACCOUNTS_SDL, PRODUCTS_SDL, REVIEWS_SDL]).await
    }

    /// The GraphQL endpoint URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), GRAPHQL_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Answer operations whose body contains `needle` with `{"data": data}`.
    pub async fn respond_data(&self, needle: &str, data: Value) {
        self.respond_body(needle, 200, json!({ "data": data })).await;
    }

    /// Answer operations whose body contains `needle` with a raw body.
    pub async fn respond_body(&self, needle: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Request bodies received so far, excluding SDL fetches.
    pub async fn operations(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
            .filter(|body| {
                !body["query"]
                    .as_str()
                    .unwrap_or_default()
                    .contains(SERVICE_DEFINITION_QUERY)
            })
            .collect()
    }
}
