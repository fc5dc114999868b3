//! Schema poller background task.
//!
//! Periodically refetches every subgraph's SDL and recomposes the
//! supergraph. A changed composition replaces the served supergraph; a
//! failed one is logged and the previous supergraph keeps serving.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled.

use crate::federation::Gateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the schema poller until `cancel_token` is cancelled.
///
/// The first poll happens one `poll_interval` after start, since the
/// supergraph has just been loaded at startup.
pub async fn start_schema_poller(
    gateway: Arc<Gateway>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "gateway.task.schema_poller",
        interval_seconds = poll_interval.as_secs(),
        "Starting schema poller"
    );

    let mut interval = interval_at(Instant::now() + poll_interval, poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match gateway.reload().await {
                    Ok(true) => {
                        info!(target: "gateway.task.schema_poller", "Supergraph recomposed from updated subgraph schemas");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            target: "gateway.task.schema_poller",
                            error = %e,
                            "Schema poll failed, keeping current supergraph"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(target: "gateway.task.schema_poller", "Schema poller received shutdown signal, exiting");
                break;
            }
        }
    }
}
