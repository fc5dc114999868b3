//! Authentication module for the gateway.
//!
//! This module handles bearer-token validation against the authorization
//! server's JWKS endpoint.
//!
//! # Components
//!
//! - `jwks` - JWKS client for fetching and caching RSA public keys
//! - `jwt` - RS256 JWT validation using cached JWKS keys
//! - `claims` - JWT claims structure for validated tokens

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;

use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;

/// Build the JWT validator described by `config`.
///
/// Performs no network I/O: signing keys are fetched lazily on the first
/// request that needs them.
pub fn build_jwt_validator(config: &Config) -> JwtValidator {
    let jwks_client = Arc::new(JwksClient::new(
        config.auth_jwks_uri.clone(),
        Duration::from_secs(config.jwks_cache_ttl_seconds),
        config.jwks_requests_per_minute,
    ));

    tracing::debug!(
        target: "gateway.auth",
        jwks_uri = %config.auth_jwks_uri,
        issuer = %config.issuer(),
        audience = %config.auth_audience,
        "Building JWT validator"
    );

    JwtValidator::new(
        jwks_client,
        config.issuer(),
        config.auth_audience.clone(),
        config.jwt_clock_skew_seconds,
    )
}
