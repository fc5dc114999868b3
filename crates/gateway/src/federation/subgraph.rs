//! Transport to the upstream GraphQL services.
//!
//! The gateway talks to subgraphs through the [`SubgraphClient`] trait so
//! that planning and merging can be tested without a network.

use crate::federation::request::GraphQlRequest;
use crate::federation::response::GraphQlResponse;
use crate::federation::ServiceDefinition;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Query every federation-aware subgraph answers with its SDL.
pub const SERVICE_DEFINITION_QUERY: &str =
    "query __ApolloGetServiceDefinition__ { _service { sdl } }";

/// Failure talking to a subgraph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubgraphError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("subgraph responded with HTTP {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

/// Trait for subgraph calls (enables mocking).
#[async_trait::async_trait]
pub trait SubgraphClient: Send + Sync {
    /// POST `request` to `service` and decode its GraphQL response.
    async fn execute(
        &self,
        service: &ServiceDefinition,
        request: &GraphQlRequest,
    ) -> Result<GraphQlResponse, SubgraphError>;
}

/// HTTP subgraph client built on a shared `reqwest::Client`.
pub struct HttpSubgraphClient {
    http_client: reqwest::Client,
}

impl HttpSubgraphClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.federation", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }
}

#[async_trait::async_trait]
impl SubgraphClient for HttpSubgraphClient {
    #[instrument(skip_all, fields(service = %service.name))]
    async fn execute(
        &self,
        service: &ServiceDefinition,
        request: &GraphQlRequest,
    ) -> Result<GraphQlResponse, SubgraphError> {
        let response = self
            .http_client
            .post(&service.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "gateway.federation", service = %service.name, error = %e, "Subgraph request failed");
                SubgraphError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubgraphError::Request(e.to_string()))?;

        // Subgraphs may report GraphQL errors with a non-2xx status
        match serde_json::from_slice::<GraphQlResponse>(&body) {
            Ok(parsed) if status.is_success() || !parsed.errors.is_empty() => Ok(parsed),
            Ok(_) => Err(SubgraphError::Status(status.as_u16())),
            Err(_) if !status.is_success() => Err(SubgraphError::Status(status.as_u16())),
            Err(e) => Err(SubgraphError::InvalidResponse(e.to_string())),
        }
    }
}

/// Mock subgraph client module for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned subgraph behaviour keyed by service name.
    #[derive(Default)]
    pub struct MockSubgraphClient {
        responses: HashMap<String, Result<GraphQlResponse, SubgraphError>>,
        requests: Mutex<Vec<(String, GraphQlRequest)>>,
    }

    impl MockSubgraphClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every request to `service` with `response`.
        pub fn respond(mut self, service: &str, response: GraphQlResponse) -> Self {
            self.responses.insert(service.to_string(), Ok(response));
            self
        }

        /// Answer every request to `service` with `data`.
        pub fn respond_data(self, service: &str, data: serde_json::Value) -> Self {
            self.respond(
                service,
                GraphQlResponse {
                    data: Some(data),
                    ..GraphQlResponse::default()
                },
            )
        }

        /// Fail every request to `service`.
        pub fn fail(mut self, service: &str, error: SubgraphError) -> Self {
            self.responses.insert(service.to_string(), Err(error));
            self
        }

        /// Requests received so far, as `(service, request)` pairs.
        pub fn requests(&self) -> Vec<(String, GraphQlRequest)> {
            self.requests
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default()
        }

        /// Requests received by `service`.
        pub fn requests_for(&self, service: &str) -> Vec<GraphQlRequest> {
            self.requests()
                .into_iter()
                .filter(|(name, _)| name == service)
                .map(|(_, request)| request)
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl SubgraphClient for MockSubgraphClient {
        async fn execute(
            &self,
            service: &ServiceDefinition,
            request: &GraphQlRequest,
        ) -> Result<GraphQlResponse, SubgraphError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((service.name.clone(), request.clone()));
            }

            self.responses
                .get(&service.name)
                .cloned()
                .unwrap_or_else(|| Err(SubgraphError::Request("no mock response".to_string())))
        }
    }
}
