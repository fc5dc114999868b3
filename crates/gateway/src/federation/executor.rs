//! Query plan execution and response merging.

use crate::federation::composition::{OperationKind, Supergraph};
use crate::federation::planner::{Fetch, PlannedKey, QueryPlan};
use crate::federation::response::{codes, GraphQlError, GraphQlResponse};
use crate::federation::subgraph::{SubgraphClient, SubgraphError};
use crate::federation::trace::RequestTimer;
use crate::observability::metrics;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Result of one fetch with its timing relative to the request start.
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<GraphQlResponse, SubgraphError>,
    pub started: Duration,
    pub duration: Duration,
}

/// Run every fetch of `plan`, returning outcomes in fetch order.
///
/// Query fetches run concurrently. Mutation fetches run one at a time so
/// that root mutation fields execute in document order.
pub async fn run_fetches(
    client: &dyn SubgraphClient,
    supergraph: &Supergraph,
    plan: &QueryPlan,
    timer: &RequestTimer,
) -> Vec<FetchOutcome> {
    match plan.kind {
        OperationKind::Query => {
            join_all(
                plan.fetches
                    .iter()
                    .map(|fetch| run_fetch(client, supergraph, fetch, timer)),
            )
            .await
        }
        OperationKind::Mutation => {
            let mut outcomes = Vec::with_capacity(plan.fetches.len());
            for fetch in &plan.fetches {
                outcomes.push(run_fetch(client, supergraph, fetch, timer).await);
            }
            outcomes
        }
    }
}

async fn run_fetch(
    client: &dyn SubgraphClient,
    supergraph: &Supergraph,
    fetch: &Fetch,
    timer: &RequestTimer,
) -> FetchOutcome {
    let started = timer.offset();
    let clock = Instant::now();

    let Some(service) = supergraph.service(fetch.service) else {
        return FetchOutcome {
            result: Err(SubgraphError::Request(format!(
                "no service at index {}",
                fetch.service
            ))),
            started,
            duration: clock.elapsed(),
        };
    };

    let result = client.execute(service, &fetch.request).await;
    let duration = clock.elapsed();

    match &result {
        Ok(_) => {
            tracing::debug!(
                target: "gateway.federation",
                service = %service.name,
                duration_ms = duration.as_millis(),
                "Subgraph fetch completed"
            );
            metrics::record_subgraph_fetch(&service.name, "success", duration);
        }
        Err(e) => {
            tracing::warn!(
                target: "gateway.federation",
                service = %service.name,
                error = %e,
                "Subgraph fetch failed"
            );
            metrics::record_subgraph_fetch(&service.name, "error", duration);
        }
    }

    FetchOutcome {
        result,
        started,
        duration,
    }
}

/// Add one resolver entry per fetched root field to the request trace.
pub fn trace_fetches(timer: &mut RequestTimer, plan: &QueryPlan, outcomes: &[FetchOutcome]) {
    let parent_type = plan.root_type_name();
    for (fetch, outcome) in plan.fetches.iter().zip(outcomes) {
        for field in &fetch.fields {
            timer.record_resolver(
                &field.response_key,
                parent_type,
                &field.field_name,
                &field.return_type,
                outcome.started,
                outcome.duration,
            );
        }
    }
}

/// Merge fetch outcomes into one response.
///
/// `data` keys follow the order of the original selection. Keys of a failed
/// fetch are `null`; keys a subgraph left out (e.g. skipped fields) are
/// omitted. Every error is tagged with the service that produced it.
pub fn merge(supergraph: &Supergraph, plan: &QueryPlan, outcomes: Vec<FetchOutcome>) -> GraphQlResponse {
    let mut errors = Vec::new();
    let mut fetched: Vec<Option<Map<String, Value>>> = Vec::with_capacity(outcomes.len());

    for (fetch, outcome) in plan.fetches.iter().zip(outcomes) {
        let service_name = supergraph
            .service(fetch.service)
            .map_or("unknown", |service| service.name.as_str());

        match outcome.result {
            Ok(response) => {
                errors.extend(
                    response
                        .errors
                        .into_iter()
                        .map(|error| error.from_service(service_name)),
                );
                fetched.push(match response.data {
                    Some(Value::Object(data)) => Some(data),
                    _ => None,
                });
            }
            Err(e) => {
                errors.push(
                    GraphQlError::new(
                        format!("Error fetching from service \"{service_name}\": {e}"),
                        codes::SUBGRAPH_FETCH_FAILED,
                    )
                    .from_service(service_name),
                );
                fetched.push(None);
            }
        }
    }

    let mut data = Map::new();
    for key in &plan.keys {
        match key {
            PlannedKey::Typename { response_key } => {
                data.insert(
                    response_key.clone(),
                    Value::String(plan.root_type_name().to_string()),
                );
            }
            PlannedKey::Fetched {
                response_key,
                fetch,
            } => match fetched.get_mut(*fetch) {
                Some(Some(values)) => {
                    if let Some(value) = values.remove(response_key) {
                        data.insert(response_key.clone(), value);
                    }
                }
                _ => {
                    data.insert(response_key.clone(), Value::Null);
                }
            },
        }
    }

    GraphQlResponse {
        data: Some(Value::Object(data)),
        errors,
        extensions: Map::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::federation::subgraph::mock::MockSubgraphClient;
    use crate::federation::{document, planner, ServiceDefinition};
    use serde_json::json;

    fn supergraph() -> Supergraph {
        Supergraph::compose(&[
            (
                ServiceDefinition::new("accounts", "http://accounts"),
                "type Query { me: User } type Mutation { login: String } type User { id: ID! }"
                    .to_string(),
            ),
            (
                ServiceDefinition::new("products", "http://products"),
                "type Query { topProducts: [Product] } type Mutation { buy: Boolean } type Product { upc: String! }"
                    .to_string(),
            ),
        ])
        .unwrap()
    }

    fn plan_for(supergraph: &Supergraph, query: &str) -> QueryPlan {
        let document = document::parse(query, "request.graphql").unwrap();
        planner::plan(supergraph, &document, None, &Map::new()).unwrap()
    }

    #[tokio::test]
    async fn test_merge_keeps_selection_order() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "{ topProducts { upc } __typename me { id } }");
        let client = MockSubgraphClient::new()
            .respond_data("accounts", json!({ "me": { "id": "1" } }))
            .respond_data("products", json!({ "topProducts": [{ "upc": "u1" }] }));

        let timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        let response = merge(&supergraph, &plan, outcomes);

        assert!(response.errors.is_empty());
        let data = response.data.unwrap();
        let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["topProducts", "__typename", "me"]);
        assert_eq!(data["__typename"], "Query");
        assert_eq!(data["me"], json!({ "id": "1" }));
    }

    #[tokio::test]
    async fn test_failed_service_only_nulls_its_fields() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "{ me { id } topProducts { upc } }");
        let client = MockSubgraphClient::new()
            .respond_data("accounts", json!({ "me": { "id": "1" } }))
            .fail("products", SubgraphError::Status(502));

        let timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        let response = merge(&supergraph, &plan, outcomes);

        let data = response.data.unwrap();
        assert_eq!(data["me"], json!({ "id": "1" }));
        assert_eq!(data["topProducts"], Value::Null);

        assert_eq!(response.errors.len(), 1);
        let error = &response.errors[0];
        assert_eq!(error.code(), Some(codes::SUBGRAPH_FETCH_FAILED));
        assert_eq!(error.extensions["serviceName"], "products");
        assert!(error.message.contains("Error fetching from service \"products\""));
    }

    #[tokio::test]
    async fn test_upstream_errors_are_tagged() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "{ me { id } }");
        let client = MockSubgraphClient::new().respond(
            "accounts",
            serde_json::from_value(json!({
                "data": { "me": null },
                "errors": [{ "message": "Not authorized", "path": ["me"] }]
            }))
            .unwrap(),
        );

        let timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        let response = merge(&supergraph, &plan, outcomes);

        assert_eq!(response.data.unwrap()["me"], Value::Null);
        assert_eq!(response.errors[0].extensions["serviceName"], "accounts");
        assert_eq!(response.errors[0].code(), Some(codes::DOWNSTREAM_SERVICE_ERROR));
    }

    #[tokio::test]
    async fn test_omitted_keys_stay_omitted() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "{ me @skip(if: true) { id } topProducts { upc } }");
        let client = MockSubgraphClient::new()
            .respond_data("accounts", json!({}))
            .respond_data("products", json!({ "topProducts": [] }));

        let timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        let response = merge(&supergraph, &plan, outcomes);

        assert_eq!(response.data.unwrap(), json!({ "topProducts": [] }));
    }

    #[tokio::test]
    async fn test_mutations_dispatch_in_document_order() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "mutation { buy login b: buy }");
        let client = MockSubgraphClient::new()
            .respond_data("accounts", json!({ "login": "token" }))
            .respond_data("products", json!({ "buy": true, "b": true }));

        let timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        assert_eq!(outcomes.len(), 3);

        let order: Vec<String> = client.requests().into_iter().map(|(name, _)| name).collect();
        assert_eq!(order, vec!["products", "accounts", "products"]);

        let response = merge(&supergraph, &plan, outcomes);
        assert_eq!(
            response.data.unwrap(),
            json!({ "buy": true, "login": "token", "b": true })
        );
    }

    #[tokio::test]
    async fn test_trace_fetches_records_each_root_field() {
        let supergraph = supergraph();
        let plan = plan_for(&supergraph, "{ me { id } topProducts { upc } }");
        let client = MockSubgraphClient::new()
            .respond_data("accounts", json!({ "me": null }))
            .respond_data("products", json!({ "topProducts": null }));

        let mut timer = RequestTimer::start();
        let outcomes = run_fetches(&client, &supergraph, &plan, &timer).await;
        trace_fetches(&mut timer, &plan, &outcomes);

        let resolvers = timer.finish().execution.resolvers;
        assert_eq!(resolvers.len(), 2);
        assert_eq!(resolvers[0].field_name, "me");
        assert_eq!(resolvers[0].parent_type, "Query");
        assert_eq!(resolvers[0].return_type, "User");
        assert_eq!(resolvers[1].return_type, "[Product]");
    }
}
