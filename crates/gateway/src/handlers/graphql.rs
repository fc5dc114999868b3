//! GraphQL endpoint handlers.
//!
//! Both handlers sit behind `require_auth`. POST accepts a single request
//! object or a batch; GET reads the request from the query string and may
//! not run mutations.

use crate::errors::GatewayError;
use crate::federation::{ExecuteOptions, GraphQlRequest, GraphQlResponse};
use crate::models::GraphQlGetParams;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::ALLOW;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;

const MISSING_QUERY_MESSAGE: &str = "GraphQL operations must contain a non-empty `query`.";

/// POST body: one request or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostBody {
    Batch(Vec<GraphQlRequest>),
    Single(GraphQlRequest),
}

/// Handler for POST /
#[instrument(skip_all, name = "gateway.graphql.post")]
pub async fn graphql_post(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let body: PostBody = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "gateway.graphql", error = %e, "Malformed request body");
        GatewayError::BadRequest("POST body must be a GraphQL request object or an array of them".to_string())
    })?;

    match body {
        PostBody::Single(request) => {
            require_query(&request)?;
            let response = state.gateway.execute(&request).await;
            Ok(graphql_response(response))
        }
        PostBody::Batch(requests) => {
            if requests.is_empty() {
                return Err(GatewayError::BadRequest(
                    "Batch must contain at least one operation".to_string(),
                ));
            }
            for request in &requests {
                require_query(request)?;
            }
            let responses = join_all(requests.iter().map(|r| state.gateway.execute(r))).await;
            Ok((StatusCode::OK, Json(responses)).into_response())
        }
    }
}

/// Handler for GET /
#[instrument(skip_all, name = "gateway.graphql.get")]
pub async fn graphql_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GraphQlGetParams>,
) -> Result<Response, GatewayError> {
    let request = GraphQlRequest {
        query: params.query.unwrap_or_default(),
        operation_name: params.operation_name,
        variables: decode_json_param("variables", params.variables.as_deref())?,
        extensions: decode_json_param("extensions", params.extensions.as_deref())?,
    };
    require_query(&request)?;

    let response = state
        .gateway
        .execute_with(
            &request,
            ExecuteOptions {
                allow_mutations: false,
            },
        )
        .await;
    Ok(graphql_response(response))
}

fn require_query(request: &GraphQlRequest) -> Result<(), GatewayError> {
    if request.query.trim().is_empty() {
        return Err(GatewayError::BadRequest(MISSING_QUERY_MESSAGE.to_string()));
    }
    Ok(())
}

/// Decode a JSON-encoded object from the query string. Absent or `null`
/// means empty.
fn decode_json_param(name: &str, raw: Option<&str>) -> Result<Map<String, Value>, GatewayError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        _ => Err(GatewayError::BadRequest(format!(
            "`{name}` must be a JSON-encoded object"
        ))),
    }
}

/// Wrap a GraphQL response with the HTTP status its errors call for.
fn graphql_response(response: GraphQlResponse) -> Response {
    let status = StatusCode::from_u16(response.http_status()).unwrap_or(StatusCode::OK);
    let mut http_response = (status, Json(response)).into_response();
    if status == StatusCode::METHOD_NOT_ALLOWED {
        http_response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
    }
    http_response
}
