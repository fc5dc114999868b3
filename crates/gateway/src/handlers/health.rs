//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that a supergraph is loaded
//! - `/.well-known/apollo/server-health`: Apollo-style health check

use crate::models::{ReadinessResponse, ServerHealthResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does not check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 once the supergraph has been composed, 503 before that.
#[tracing::instrument(skip_all, name = "gateway.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.gateway.is_ready().await {
        return (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                supergraph: "loaded",
                error: None,
            }),
        );
    }

    tracing::warn!(target: "gateway.health", "Readiness check failed: supergraph not loaded");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadinessResponse {
            status: "not_ready",
            supergraph: "not_loaded",
            error: Some("Service dependencies unavailable".to_string()),
        }),
    )
}

/// Apollo server health check handler.
pub async fn server_health() -> Json<ServerHealthResponse> {
    Json(ServerHealthResponse { status: "pass" })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[tokio::test]
    async fn test_server_health() {
        let Json(body) = server_health().await;
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"status":"pass"}"#);
    }

    #[test]
    fn test_readiness_response_serialization() {
        let ready = ReadinessResponse {
            status: "ready",
            supergraph: "loaded",
            error: None,
        };
        let json = serde_json::to_string(&ready).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        assert!(!json.contains("\"error\""));

        let not_ready = ReadinessResponse {
            status: "not_ready",
            supergraph: "not_loaded",
            error: Some("Service dependencies unavailable".to_string()),
        };
        let json = serde_json::to_string(&not_ready).unwrap();
        assert!(json.contains("\"supergraph\":\"not_loaded\""));
        assert!(json.contains("\"error\":\"Service dependencies unavailable\""));
    }
}
