//! Federated GraphQL gateway library.
//!
//! The gateway composes three upstream GraphQL services into one supergraph
//! and serves it behind a single HTTP endpoint. Every GraphQL request must
//! carry an RS256 bearer token verified against the authorization server's
//! JWKS.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> federation (plan, fetch, merge)
//! ```
//!
//! # Modules
//!
//! - `auth` - JWKS client and JWT validation
//! - `config` - Service configuration from environment
//! - `errors` - HTTP error types with status code mapping
//! - `federation` - Supergraph composition, query planning and execution
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Operational endpoint payloads
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod federation;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod tasks;
