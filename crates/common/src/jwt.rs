//! JWT utilities shared by the gateway and its test harness.
//!
//! This module provides the pieces of token handling that happen BEFORE any
//! key lookup or signature verification:
//! - Size limits for DoS prevention
//! - Clock skew constants used as validation leeway
//! - Unverified header inspection (`kid`, `alg`)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; the header `alg` is checked before key lookup
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{inspect_header, ACCEPTED_ALGORITHM};
//!
//! let header = inspect_header(token)?;
//! let jwk = jwks_client.get_key(&header.kid).await?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical RS256 access tokens are 700-1200 bytes
/// - 8KB leaves room for custom claims while bounding base64/JSON work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// The only signing algorithm the gateway accepts.
pub const ACCEPTED_ALGORITHM: &str = "RS256";

/// Default JWT clock skew tolerance applied to `exp` and `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Bounds misconfiguration that would otherwise keep expired tokens usable.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT header.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token header names an algorithm other than [`ACCEPTED_ALGORITHM`].
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,
}

// =============================================================================
// Header Types
// =============================================================================

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

/// The subset of the JOSE header the gateway needs before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID naming the JWKS entry that signed the token.
    pub kid: String,

    /// Declared signing algorithm.
    pub alg: String,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the token signature
/// - The returned `kid` should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, or no `alg`
/// - `MissingKid` - Header missing `kid`, or `kid` is not a non-empty string
/// - `UnsupportedAlgorithm` - `alg` is not `RS256`
pub fn inspect_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .alg
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or(JwtValidationError::MalformedToken)?;

    if alg != ACCEPTED_ALGORITHM {
        tracing::debug!(target: "common.jwt", alg = %alg, "Token rejected: unsupported algorithm");
        return Err(JwtValidationError::UnsupportedAlgorithm);
    }

    // Empty kid values are rejected along with missing ones
    let kid = header
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader {
        kid,
        alg: alg.to_string(),
    })
}

/// Build the issuer URL expected in tokens minted by `domain`.
///
/// The trailing slash is significant: issuers are compared as exact strings.
#[must_use]
pub fn issuer_for_domain(domain: &str) -> String {
    format!("https://{domain}/")
}

/// Build the well-known JWKS URL published by `domain`.
#[must_use]
pub fn jwks_uri_for_domain(domain: &str) -> String {
    format!("https://{domain}/.well-known/jwks.json")
}

// =============================================================================
// Tests
// =============================================================================
