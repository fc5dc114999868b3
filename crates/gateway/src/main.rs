//! Federated GraphQL Gateway
//!
//! Entry point for the gateway service.
//!
//! # Startup Sequence
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Load the supergraph from the configured subgraphs (fatal on failure)
//! 5. Start the schema poller (when configured)
//! 6. Serve HTTP until a shutdown signal arrives

use gateway::config::Config;
use gateway::federation::build_gateway;
use gateway::observability::metrics::init_metrics_recorder;
use gateway::routes::{self, AppState};
use gateway::tasks::start_schema_poller;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GraphQL gateway");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        port = config.port,
        auth_domain = %config.auth_domain,
        jwks_uri = %config.auth_jwks_uri,
        tracing_enabled = config.tracing_enabled,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        format!("Failed to install Prometheus metrics recorder: {e}")
    })?;

    let gateway = Arc::new(build_gateway(&config));
    for service in gateway.service_list() {
        info!(name = %service.name, url = %service.url, "Registered subgraph");
    }

    gateway.load().await.map_err(|e| {
        error!(error = %e, "Failed to load supergraph");
        e
    })?;

    let shutdown_token = CancellationToken::new();

    if let Some(seconds) = config.schema_poll_interval_seconds {
        let poller_gateway = Arc::clone(&gateway);
        let poller_token = shutdown_token.child_token();
        tokio::spawn(async move {
            start_schema_poller(poller_gateway, Duration::from_secs(seconds), poller_token).await;
        });
    }

    let addr = config.bind_address();
    let port = config.port;
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState { config, gateway });
    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(%addr, error = %e, "Failed to bind listener");
        e
    })?;

    info!("Server ready at http://localhost:{}/", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_seconds))
    .await?;

    shutdown_token.cancel();
    info!("GraphQL gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
