//! Gateway HTTP models.
//!
//! GraphQL bodies live in `federation::request`/`federation::response`;
//! this module holds the operational endpoint payloads.

use serde::{Deserialize, Serialize};

/// Readiness check response.
///
/// Returned by the `/ready` endpoint (readiness probe).
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// Service readiness status ("ready" or "not_ready").
    pub status: &'static str,

    /// Supergraph state ("loaded" or "not_loaded").
    pub supergraph: &'static str,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Apollo-compatible health check body for `/.well-known/apollo/server-health`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerHealthResponse {
    pub status: &'static str,
}

/// Query string of a GraphQL GET request.
///
/// `variables` and `extensions` arrive JSON-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlGetParams {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    pub variables: Option<String>,
    pub extensions: Option<String>,
}
