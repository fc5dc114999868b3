//! Operational endpoint integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use gateway_test_utils::{MockSubgraph, TestGatewayServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn(&subgraphs).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_ready_endpoint_reports_loaded_supergraph() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn(&subgraphs).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["supergraph"], "loaded");
    assert!(body.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test_server_health_endpoint_passes() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn(&subgraphs).await?;

    let response =
        reqwest::get(format!("{}/.well-known/apollo/server-health", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({ "status": "pass" }));
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_counters() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn(&subgraphs).await?;

    // Generate at least one recorded request
    let health = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(health.status(), StatusCode::OK);

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await?;
    assert!(body.contains("gateway_http_requests_total"));
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight_does_not_require_auth() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn_with(
        &subgraphs,
        &[("CORS_ALLOWED_ORIGINS", "https://studio.example")],
    )
    .await?;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url())
        .header("Origin", "https://studio.example")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization,content-type")
        .send()
        .await?;

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://studio.example"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    Ok(())
}

#[tokio::test]
async fn test_cors_ignores_unlisted_origin() -> Result<()> {
    let subgraphs = MockSubgraph::start_default().await;
    let server = TestGatewayServer::spawn_with(
        &subgraphs,
        &[("CORS_ALLOWED_ORIGINS", "https://studio.example")],
    )
    .await?;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url())
        .header("Origin", "https://evil.example")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await?;

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
    Ok(())
}
