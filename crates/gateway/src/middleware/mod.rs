//! Middleware for the gateway.
//!
//! # Components
//!
//! - `auth` - Bearer-token authentication for the GraphQL endpoint
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
