//! Federation gateway.
//!
//! The gateway composes a supergraph from the SDL its subgraphs publish and
//! executes client operations by splitting them per root field:
//!
//! ```text
//! parse (document.rs) -> plan (planner.rs) -> fetch + merge (executor.rs)
//! ```
//!
//! The composed supergraph sits behind an `RwLock` so it can be replaced by
//! the schema poller while requests are in flight.

pub mod composition;
pub mod document;
pub mod executor;
pub mod planner;
pub mod request;
pub mod response;
pub mod subgraph;
pub mod trace;

pub use composition::{OperationKind, Supergraph};
pub use request::GraphQlRequest;
pub use response::{codes, GraphQlError, GraphQlResponse, Location};
pub use subgraph::{HttpSubgraphClient, SubgraphClient, SubgraphError};

use crate::config::Config;
use crate::observability::metrics;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// A named upstream GraphQL service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: String,
    pub url: String,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Failure to build the supergraph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FederationError {
    #[error("subgraph \"{service}\" unavailable: {reason}")]
    SubgraphUnavailable { service: String, reason: String },

    #[error("supergraph composition failed: {}", .0.join("; "))]
    Composition(Vec<String>),
}

/// Per-request execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Whether mutation operations may run (false for GET requests).
    pub allow_mutations: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            allow_mutations: true,
        }
    }
}

/// The federation gateway.
pub struct Gateway {
    services: Vec<ServiceDefinition>,
    client: Arc<dyn SubgraphClient>,
    supergraph: RwLock<Option<Arc<Supergraph>>>,
    tracing_enabled: bool,
}

impl Gateway {
    /// Create a gateway over `services`. No supergraph is loaded until
    /// [`Gateway::load`] succeeds.
    pub fn new(
        services: Vec<ServiceDefinition>,
        client: Arc<dyn SubgraphClient>,
        tracing_enabled: bool,
    ) -> Self {
        Self {
            services,
            client,
            supergraph: RwLock::new(None),
            tracing_enabled,
        }
    }

    /// The configured services, in order.
    pub fn service_list(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracing_enabled
    }

    /// Whether a supergraph has been composed.
    pub async fn is_ready(&self) -> bool {
        self.supergraph.read().await.is_some()
    }

    /// The current supergraph, if loaded.
    pub async fn supergraph(&self) -> Option<Arc<Supergraph>> {
        self.supergraph.read().await.clone()
    }

    /// Fetch every subgraph's SDL, compose, and store the supergraph.
    ///
    /// # Errors
    ///
    /// Returns `FederationError::SubgraphUnavailable` if any subgraph cannot
    /// provide its SDL, or `FederationError::Composition` if the SDLs do not
    /// compose.
    #[instrument(skip_all, fields(services = self.services.len()))]
    pub async fn load(&self) -> Result<Arc<Supergraph>, FederationError> {
        let supergraph = self.compose().await?;
        self.store(Arc::clone(&supergraph)).await;

        tracing::info!(
            target: "gateway.federation",
            root_fields = supergraph.root_field_count(),
            "Supergraph loaded"
        );
        Ok(supergraph)
    }

    /// Recompose and replace the supergraph if any subgraph SDL changed.
    ///
    /// Returns `true` when the stored supergraph was replaced. On error the
    /// current supergraph is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Gateway::load`].
    #[instrument(skip_all)]
    pub async fn reload(&self) -> Result<bool, FederationError> {
        let candidate = self.compose().await?;

        let unchanged = self
            .supergraph()
            .await
            .is_some_and(|current| current.same_sources(&candidate));
        if unchanged {
            tracing::debug!(target: "gateway.federation", "Subgraph schemas unchanged");
            return Ok(false);
        }

        tracing::info!(
            target: "gateway.federation",
            root_fields = candidate.root_field_count(),
            "Supergraph updated"
        );
        self.store(candidate).await;
        Ok(true)
    }

    async fn store(&self, supergraph: Arc<Supergraph>) {
        metrics::set_supergraph_root_fields(supergraph.root_field_count());
        *self.supergraph.write().await = Some(supergraph);
    }

    async fn compose(&self) -> Result<Arc<Supergraph>, FederationError> {
        let fetched = join_all(self.services.iter().map(|service| self.fetch_sdl(service)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>();

        let subgraphs = match fetched {
            Ok(subgraphs) => subgraphs,
            Err(e) => {
                metrics::record_composition("error");
                return Err(e);
            }
        };

        match Supergraph::compose(&subgraphs) {
            Ok(supergraph) => {
                metrics::record_composition("success");
                Ok(Arc::new(supergraph))
            }
            Err(errors) => {
                metrics::record_composition("error");
                for error in &errors {
                    tracing::error!(target: "gateway.federation", error = %error, "Composition error");
                }
                Err(FederationError::Composition(errors))
            }
        }
    }

    async fn fetch_sdl(
        &self,
        service: &ServiceDefinition,
    ) -> Result<(ServiceDefinition, String), FederationError> {
        let unavailable = |reason: String| {
            tracing::error!(
                target: "gateway.federation",
                service = %service.name,
                url = %service.url,
                reason = %reason,
                "Could not load subgraph SDL"
            );
            FederationError::SubgraphUnavailable {
                service: service.name.clone(),
                reason,
            }
        };

        let response = self
            .client
            .execute(service, &GraphQlRequest::new(subgraph::SERVICE_DEFINITION_QUERY))
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if let Some(error) = response.errors.first() {
            return Err(unavailable(error.message.clone()));
        }

        let sdl = response
            .data
            .as_ref()
            .and_then(|data| data.get("_service"))
            .and_then(|service| service.get("sdl"))
            .and_then(Value::as_str)
            .ok_or_else(|| unavailable("response did not contain _service.sdl".to_string()))?;

        Ok((service.clone(), sdl.to_string()))
    }

    /// Execute a client request with default options.
    pub async fn execute(&self, request: &GraphQlRequest) -> GraphQlResponse {
        self.execute_with(request, ExecuteOptions::default()).await
    }

    /// Execute a client request.
    ///
    /// Never fails: every problem is reported as a GraphQL error whose code
    /// determines the HTTP status (see [`GraphQlResponse::http_status`]).
    #[instrument(
        skip_all,
        fields(operation_name = request.operation_name.as_deref().unwrap_or(""))
    )]
    pub async fn execute_with(
        &self,
        request: &GraphQlRequest,
        options: ExecuteOptions,
    ) -> GraphQlResponse {
        let Some(supergraph) = self.supergraph().await else {
            return GraphQlResponse::from_error(GraphQlError::new(
                "The gateway has not loaded a supergraph yet.",
                codes::SUPERGRAPH_NOT_READY,
            ));
        };

        let mut timer = trace::RequestTimer::start();

        let parsing_started = timer.offset();
        let document = match document::parse(&request.query, "request.graphql") {
            Ok(document) => document,
            Err(errors) => {
                tracing::debug!(target: "gateway.federation", errors = errors.len(), "Rejected unparsable document");
                return GraphQlResponse::from_errors(
                    errors
                        .into_iter()
                        .map(|e| GraphQlError::new(e.message, codes::GRAPHQL_PARSE_FAILED).at(e.location))
                        .collect(),
                );
            }
        };
        timer.record_parsing(parsing_started);

        let validation_started = timer.offset();
        let operation_name = request
            .operation_name
            .as_deref()
            .filter(|name| !name.is_empty());
        let plan = match planner::plan(&supergraph, &document, operation_name, &request.variables) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::debug!(target: "gateway.federation", error = %e, "Rejected invalid operation");
                return GraphQlResponse::from_error(GraphQlError::new(
                    e.0,
                    codes::GRAPHQL_VALIDATION_FAILED,
                ));
            }
        };
        timer.record_validation(validation_started);

        if plan.kind == OperationKind::Mutation && !options.allow_mutations {
            return GraphQlResponse::from_error(GraphQlError::new(
                "Mutations can only be sent over POST.",
                codes::METHOD_NOT_ALLOWED,
            ));
        }

        tracing::debug!(
            target: "gateway.federation",
            fetches = plan.fetches.len(),
            "Executing query plan"
        );

        let outcomes = executor::run_fetches(self.client.as_ref(), &supergraph, &plan, &timer).await;
        executor::trace_fetches(&mut timer, &plan, &outcomes);
        let mut response = executor::merge(&supergraph, &plan, outcomes);

        if self.tracing_enabled {
            match serde_json::to_value(timer.finish()) {
                Ok(tracing_extension) => {
                    response
                        .extensions
                        .insert("tracing".to_string(), tracing_extension);
                }
                Err(e) => {
                    tracing::warn!(target: "gateway.federation", error = %e, "Failed to serialize tracing extension");
                }
            }
        }

        response
    }
}

/// Build the gateway for the configured subgraphs. Performs no I/O.
pub fn build_gateway(config: &Config) -> Gateway {
    let client = HttpSubgraphClient::new(Duration::from_secs(config.subgraph_timeout_seconds));
    Gateway::new(config.service_list(), Arc::new(client), config.tracing_enabled)
}
