//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::build_jwt_validator;
use crate::config::Config;
use crate::federation::Gateway;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Federation gateway executing GraphQL operations.
    pub gateway: Arc<Gateway>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - GraphQL endpoint (GET and POST) - requires authentication
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (supergraph loaded) - public
/// - `/.well-known/apollo/server-health` - Apollo health check - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout outlasting the subgraph timeout (at least 30 seconds)
/// - CORS for the configured origins
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let jwt_validator = Arc::new(build_jwt_validator(&state.config));
    let auth_state = Arc::new(AuthState { jwt_validator });
    let cors = build_cors_layer(&state.config.cors_allowed_origins);
    let request_timeout = state.config.request_timeout();

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route(
            "/.well-known/apollo/server-health",
            get(handlers::server_health),
        )
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/",
            get(handlers::graphql_get).post(handlers::graphql_post),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. http_metrics_middleware - Record ALL responses
    // 4. CorsLayer - Answer preflights before auth runs (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
}

/// Build the CORS layer for an explicit origin list.
///
/// Credentials are allowed, so methods and headers are listed explicitly.
/// Origins that are not valid header values are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(target: "gateway.cors", origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("apollographql-client-name"),
            HeaderName::from_static("apollographql-client-version"),
        ])
        .max_age(Duration::from_secs(600))
}
