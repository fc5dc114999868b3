//! Authentication integration tests.
//!
//! Tests bearer-token validation on the GraphQL endpoint using a mocked JWKS
//! server and fixed RSA test keys.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use gateway_test_utils::{MockSubgraph, TestGatewayServer, TestKeypair};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

const ME_QUERY: &str = "{ me { id } }";

async fn spawn() -> Result<(TestGatewayServer, [MockSubgraph; 3])> {
    let subgraphs = MockSubgraph::start_default().await;
    subgraphs[0]
        .respond_data("me", json!({ "me": { "id": "1" } }))
        .await;
    let server = TestGatewayServer::spawn(&subgraphs).await?;
    Ok((server, subgraphs))
}

async fn post_query(server: &TestGatewayServer, authorization: Option<&str>) -> reqwest::Response {
    let mut request = reqwest::Client::new()
        .post(server.url())
        .json(&json!({ "query": ME_QUERY }));
    if let Some(value) = authorization {
        request = request.header("Authorization", value);
    }
    request.send().await.unwrap()
}

async fn assert_unauthorized(response: reqwest::Response, code: &str) -> Value {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .expect("401 responses carry a challenge")
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.starts_with("Bearer"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], code);
    body
}

#[tokio::test]
async fn test_valid_token_is_accepted() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;

    let response = post_query(&server, Some(&format!("Bearer {}", server.token()))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["data"]["me"]["id"], "1");
    Ok(())
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_is_accepted() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;

    let response = post_query(&server, Some(&format!("bearer {}", server.token()))).await;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_missing_token_is_rejected() -> Result<()> {
    let (server, subgraphs) = spawn().await?;

    let response = post_query(&server, None).await;

    assert_unauthorized(response, "MISSING_TOKEN").await;
    // No subgraph sees unauthenticated traffic
    for subgraph in &subgraphs {
        assert!(subgraph.operations().await.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_malformed_authorization_header_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;

    for header in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer a b", "Token abc"] {
        let response = post_query(&server, Some(header)).await;
        let body = assert_unauthorized(response, "INVALID_TOKEN").await;
        assert_eq!(
            body["error"]["message"],
            "Format is Authorization: Bearer [token]"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let mut claims = server.valid_claims();
    let past = Utc::now().timestamp() - 7200;
    claims["iat"] = json!(past);
    claims["exp"] = json!(past + 60);

    let token = server.keypair().sign(&claims);
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let mut claims = server.valid_claims();
    claims["aud"] = json!("https://some-other-api.example");

    let token = server.keypair().sign(&claims);
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let mut claims = server.valid_claims();
    claims["iss"] = json!("https://attacker.example/");

    let token = server.keypair().sign(&claims);
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_is_signing_key_not_found() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let stranger = TestKeypair::secondary();

    let token = stranger.sign(&server.valid_claims());
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    let body = assert_unauthorized(response, "SIGNING_KEY_NOT_FOUND").await;
    assert_eq!(
        body["error"]["message"],
        "JWT verification SigningKeyNotFoundError"
    );
    Ok(())
}

#[tokio::test]
async fn test_known_kid_with_foreign_signature_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    // Secondary key material published under the primary kid
    let impostor = TestKeypair::secondary().with_kid(server.keypair().kid());

    let token = impostor.sign(&server.valid_claims());
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_hs256_token_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(server.keypair().kid().to_string());

    let token = encode(
        &header,
        &server.valid_claims(),
        &EncodingKey::from_secret(b"guessable-shared-secret"),
    )?;
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_unsigned_token_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let header = URL_SAFE_NO_PAD.encode(
        json!({ "alg": "none", "typ": "JWT", "kid": server.keypair().kid() }).to_string(),
    );
    let payload = URL_SAFE_NO_PAD.encode(server.valid_claims().to_string());

    let response = post_query(&server, Some(&format!("Bearer {header}.{payload}."))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_oversized_token_is_rejected() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let mut claims = server.valid_claims();
    claims["padding"] = json!("x".repeat(9000));

    let token = server.keypair().sign(&claims);
    let response = post_query(&server, Some(&format!("Bearer {token}"))).await;

    assert_unauthorized(response, "INVALID_TOKEN").await;
    Ok(())
}

#[tokio::test]
async fn test_jwks_is_fetched_once_for_repeated_requests() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let authorization = format!("Bearer {}", server.token());

    for _ in 0..3 {
        let response = post_query(&server, Some(&authorization)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let fetches = server.jwks_server().received_requests().await.unwrap();
    assert_eq!(fetches.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_operational_endpoints_do_not_require_auth() -> Result<()> {
    let (server, _subgraphs) = spawn().await?;
    let client = reqwest::Client::new();

    for endpoint in ["/health", "/ready", "/.well-known/apollo/server-health", "/metrics"] {
        let response = client
            .get(format!("{}{}", server.url(), endpoint))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK, "{endpoint}");
    }
    Ok(())
}
