//! HTTP request handlers for the gateway.

pub mod graphql;
pub mod health;
pub mod metrics;

pub use graphql::{graphql_get, graphql_post};
pub use health::{health_check, readiness_check, server_health};
pub use metrics::metrics_handler;
