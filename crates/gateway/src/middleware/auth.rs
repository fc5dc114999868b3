//! Authentication middleware for the GraphQL endpoint.
//!
//! Extracts the Bearer token from the Authorization header, validates it with
//! the JWKS-backed validator, and injects the claims into request extensions.

use crate::auth::JwtValidator;
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Message for an Authorization header that is not `Bearer <token>`.
pub const BEARER_FORMAT_MESSAGE: &str = "Format is Authorization: Bearer [token]";

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Extract the Bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively; the header must contain exactly
/// the scheme and the token.
fn extract_bearer_token(req: &Request) -> Result<&str, GatewayError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| {
            tracing::debug!(target: "gateway.middleware.auth", "Missing Authorization header");
            GatewayError::MissingToken
        })?
        .to_str()
        .map_err(|_| GatewayError::InvalidToken(BEARER_FORMAT_MESSAGE.to_string()))?;

    let mut parts = auth_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => {
            tracing::debug!(target: "gateway.middleware.auth", "Invalid Authorization header format");
            Err(GatewayError::InvalidToken(BEARER_FORMAT_MESSAGE.to_string()))
        }
    }
}

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Returns 503 Service Unavailable if signing keys cannot be fetched
/// - Continues to next handler with `Claims` in extensions if token is valid
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let token = extract_bearer_token(&req)?;

    let claims = state.jwt_validator.validate(token).await.map_err(|e| {
        tracing::debug!(target: "gateway.middleware.auth", error = %e, "Request rejected");
        e
    })?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Token validation paths need a JWKS endpoint and are covered by the
    // integration tests. These tests cover header parsing.

    use super::*;
    use axum::body::Body;

    fn request_with(header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_missing_header_is_missing_token() {
        let req = request_with(None);
        assert!(matches!(
            extract_bearer_token(&req),
            Err(GatewayError::MissingToken)
        ));
    }

    #[test]
    fn test_bearer_token_is_extracted() {
        let req = request_with(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let req = request_with(Some("bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&req).unwrap(), "abc.def.ghi");

        let req = request_with(Some("BEARER abc.def.ghi"));
        assert_eq!(extract_bearer_token(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_wrong_scheme_or_shape_is_invalid_format() {
        for value in [
            "Basic dXNlcjpwYXNz",
            "Bearer",
            "Bearer a b",
            "abc.def.ghi",
            "",
        ] {
            let req = request_with(Some(value));
            let result = extract_bearer_token(&req);
            assert!(
                matches!(&result, Err(GatewayError::InvalidToken(msg)) if msg == BEARER_FORMAT_MESSAGE),
                "Expected format error for {:?}, got {:?}",
                value,
                result
            );
        }
    }
}
