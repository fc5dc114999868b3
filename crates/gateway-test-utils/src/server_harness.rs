//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests,
//! wired to a mocked JWKS endpoint and three mock subgraphs.

use crate::subgraphs::MockSubgraph;
use crate::token::{jwks_json, valid_claims, TestKeypair};
use gateway::config::Config;
use gateway::federation::build_gateway;
use gateway::observability::metrics::init_metrics_recorder;
use gateway::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tenant domain every test token is issued by.
pub const TEST_AUTH_DOMAIN: &str = "test-tenant.auth.example";

/// Audience every test token is issued for.
pub const TEST_AUDIENCE: &str = "https://gateway.test/api";

const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let subgraphs = MockSubgraph::start_three(SDLS).await;
///     let server = TestGatewayServer::spawn(&subgraphs).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    jwks_server: MockServer,
    keypair: TestKeypair,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway over `subgraphs` with default settings.
    pub async fn spawn(subgraphs: &[MockSubgraph; 3]) -> Result<Self, anyhow::Error> {
        Self::spawn_with(subgraphs, &[]).await
    }

    /// Spawn a gateway over `subgraphs`, overriding environment variables
    /// with `overrides`.
    ///
    /// The server will:
    /// - Publish the primary test key on a mock JWKS endpoint
    /// - Load the supergraph from the mock subgraphs
    /// - Bind to a random available port (127.0.0.1:0)
    pub async fn spawn_with(
        subgraphs: &[MockSubgraph; 3],
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let keypair = TestKeypair::primary();

        let jwks_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(&[&keypair])))
            .mount(&jwks_server)
            .await;

        let [s1, s2, s3] = subgraphs;
        let mut vars = HashMap::from([
            ("SERVICE_1_ENDPOINT".to_string(), s1.url()),
            ("SERVICE_2_ENDPOINT".to_string(), s2.url()),
            ("SERVICE_3_ENDPOINT".to_string(), s3.url()),
            ("AUTH_DOMAIN".to_string(), TEST_AUTH_DOMAIN.to_string()),
            ("AUTH_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            (
                "AUTH_JWKS_URI".to_string(),
                format!("{}{}", jwks_server.uri(), JWKS_PATH),
            ),
            ("BIND_HOST".to_string(), "127.0.0.1".to_string()),
            ("SUBGRAPH_TIMEOUT_SECONDS".to_string(), "5".to_string()),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let gateway = Arc::new(build_gateway(&config));
        gateway
            .load()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load supergraph: {}", e))?;

        let state = Arc::new(AppState {
            config: config.clone(),
            gateway,
        });

        // Build routes using the gateway's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            jwks_server,
            keypair,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server (the GraphQL endpoint is `/`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock JWKS server, for asserting fetch counts or remounting keys.
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// The key published on the JWKS endpoint.
    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    /// Claims that the gateway accepts.
    pub fn valid_claims(&self) -> Value {
        valid_claims(&self.config.issuer(), TEST_AUDIENCE)
    }

    /// A token that the gateway accepts.
    pub fn token(&self) -> String {
        self.keypair.sign(&self.valid_claims())
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
