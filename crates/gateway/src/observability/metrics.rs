//! Metrics definitions for the gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gateway_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the handful of mounted paths, everything else is `/other`
//! - `status`: success, error, timeout
//! - `service`: the three configured subgraph names
//! - `error_type`: bounded by error variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return its handle.
///
/// Can only succeed once per process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
                5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gateway_subgraph_fetch".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set subgraph fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gateway_http_requests_total`, `gateway_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gateway_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gateway_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed set of mounted endpoints.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/.well-known/apollo/server-health" => "/.well-known/apollo/server-health",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of a JWT validation
///
/// Metric: `gateway_jwt_validations_total`
/// Labels: `result`, `error_type`
pub fn record_jwt_validation(result: &'static str, error_type: &'static str) {
    counter!("gateway_jwt_validations_total",
        "result" => result,
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a JWKS fetch attempt
///
/// Metric: `gateway_jwks_fetches_total`
/// Labels: `status` (success, error, rate_limited)
pub fn record_jwks_fetch(status: &'static str) {
    counter!("gateway_jwks_fetches_total", "status" => status).increment(1);
}

// ============================================================================
// Federation Metrics
// ============================================================================

/// Record one HTTP call to a subgraph
///
/// Metric: `gateway_subgraph_fetch_duration_seconds`, `gateway_subgraph_fetches_total`
/// Labels: `service`, `status`
pub fn record_subgraph_fetch(service: &str, status: &'static str, duration: Duration) {
    histogram!("gateway_subgraph_fetch_duration_seconds",
        "service" => service.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gateway_subgraph_fetches_total",
        "service" => service.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a supergraph composition attempt
///
/// Metric: `gateway_composition_total`
/// Labels: `status`
pub fn record_composition(status: &'static str) {
    counter!("gateway_composition_total", "status" => status).increment(1);
}

/// Publish the number of root fields in the active supergraph
///
/// Metric: `gateway_supergraph_root_fields`
pub fn set_supergraph_root_fields(count: usize) {
    gauge!("gateway_supergraph_root_fields").set(count as f64);
}

// ============================================================================
// Tests
// ============================================================================
