//! JWT validation for the gateway.
//!
//! Validates incoming bearer tokens using public keys fetched from the
//! authorization server's JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted, both in the header and in the decoder
//! - Issuer, audience and expiry are validated with clock skew tolerance
//! - Generic error messages prevent information leakage

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::GatewayError;
use crate::observability::metrics::record_jwt_validation;
use common::jwt::inspect_header;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tracing::instrument;

/// Message returned for every verification failure.
const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// JWT validator using JWKS from the authorization server.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Expected `iss` claim.
    issuer: String,

    /// Audience the token must be issued for.
    audience: String,

    /// Clock skew tolerance in seconds for `exp`/`nbf` validation.
    leeway_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client for fetching public keys
    /// * `issuer` - Exact expected issuer, e.g. `https://tenant.auth0.com/`
    /// * `audience` - Audience every token must contain
    /// * `leeway_seconds` - Clock skew tolerance for time-based claims
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: String,
        audience: String,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
            leeway_seconds,
        }
    }

    /// The JWKS client backing this validator.
    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Header check - `alg` must be RS256 and `kid` a non-empty string
    /// 3. Fetch public key from JWKS
    /// 4. Verify RS256 signature
    /// 5. Validate `exp`, `nbf`, `iss` and `aud` with leeway
    ///
    /// # Errors
    ///
    /// - `GatewayError::InvalidToken` for every token problem (generic message)
    /// - `GatewayError::SigningKeyNotFound` if the `kid` is not published
    /// - `GatewayError::ServiceUnavailable` if the JWKS cannot be fetched
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Claims, GatewayError> {
        let result = self.validate_inner(token).await;
        match &result {
            Ok(_) => record_jwt_validation("success", "none"),
            Err(e) => record_jwt_validation("error", e.kind()),
        }
        result
    }

    async fn validate_inner(&self, token: &str) -> Result<Claims, GatewayError> {
        // 1 + 2. Size check and header inspection
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token header rejected");
            GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })?;

        // 3. Fetch public key from JWKS
        let jwk = self.jwks_client.get_key(&header.kid).await?;

        // 4 + 5. Verify signature and registered claims
        let claims = verify_token(token, &jwk, &self.validation())?;

        tracing::debug!(target: "gateway.auth.jwt", "Token validated successfully");
        Ok(claims)
    }

    /// Build the `jsonwebtoken` validation rules for this validator.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }
}

/// Verify JWT signature and extract claims.
///
/// The key must be an RSA signing key; its `n`/`e` components build the
/// decoding key.
pub fn verify_token(token: &str, jwk: &Jwk, validation: &Validation) -> Result<Claims, GatewayError> {
    if !jwk.is_rs256_signing_key() {
        tracing::warn!(target: "gateway.auth.jwt", kty = %jwk.kty, alg = ?jwk.alg, "Unusable JWK for RS256");
        return Err(GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        return Err(GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
    };

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::error!(target: "gateway.auth.jwt", error = %e, kid = ?jwk.kid, "Invalid RSA key components");
        GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
    })?;

    let token_data = decode::<Claims>(token, &decoding_key, validation).map_err(|e| {
        tracing::debug!(target: "gateway.auth.jwt", error = %e, "Token verification failed");
        GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
    })?;

    Ok(token_data.claims)
}
