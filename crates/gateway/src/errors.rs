//! Gateway HTTP error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.
//!
//! GraphQL execution problems are NOT represented here: they travel inside a
//! GraphQL response body (see `federation::response`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message used when a token's signing key is absent from the JWKS.
pub const SIGNING_KEY_NOT_FOUND_MESSAGE: &str = "JWT verification SigningKeyNotFoundError";

/// Gateway error type.
///
/// Maps to appropriate HTTP status codes:
/// - MissingToken, InvalidToken, SigningKeyNotFound: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No authorization token was found")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("{}", SIGNING_KEY_NOT_FOUND_MESSAGE)]
    SigningKeyNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingToken
            | GatewayError::InvalidToken(_)
            | GatewayError::SigningKeyNotFound => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::ServiceUnavailable(_) => 503,
        }
    }

    /// Bounded label used for auth metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingToken => "missing_token",
            GatewayError::InvalidToken(_) => "invalid_token",
            GatewayError::SigningKeyNotFound => "signing_key_not_found",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                "No authorization token was found".to_string(),
            ),
            GatewayError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            GatewayError::SigningKeyNotFound => (
                StatusCode::UNAUTHORIZED,
                "SIGNING_KEY_NOT_FOUND",
                SIGNING_KEY_NOT_FOUND_MESSAGE.to_string(),
            ),
            GatewayError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GatewayError::ServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "gateway.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"graphql-gateway\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
