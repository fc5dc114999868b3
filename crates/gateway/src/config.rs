//! Gateway configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! validated before any listener, JWKS client or subgraph client is built.

use crate::federation::ServiceDefinition;
use common::jwt::{issuer_for_domain, jwks_uri_for_domain, DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4000;

/// Default listen host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default cap on requests to the JWKS endpoint, per minute.
pub const DEFAULT_JWKS_REQUESTS_PER_MINUTE: u32 = 1000;

/// Default JWKS cache lifetime in seconds (10 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 600;

/// Default origin allowed to make credentialed cross-origin requests.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default per-request timeout for subgraph calls in seconds.
pub const DEFAULT_SUBGRAPH_TIMEOUT_SECONDS: u64 = 30;

/// Lower bound for the whole-request timeout in seconds.
pub const MIN_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Time left after the slowest subgraph call for merging and responding.
const REQUEST_TIMEOUT_HEADROOM_SECONDS: u64 = 5;

/// Environment variables naming the upstream services, in service-list order.
pub const SERVICE_ENDPOINT_VARS: [&str; 3] = [
    "SERVICE_1_ENDPOINT",
    "SERVICE_2_ENDPOINT",
    "SERVICE_3_ENDPOINT",
];

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream GraphQL service URLs, in `SERVICE_{1,2,3}_ENDPOINT` order.
    pub service_endpoints: [String; 3],

    /// Authorization server domain, e.g. `tenant.auth0.com`.
    pub auth_domain: String,

    /// Audience every accepted token must carry.
    pub auth_audience: String,

    /// JWKS endpoint. Derived from `auth_domain` unless `AUTH_JWKS_URI` is set.
    pub auth_jwks_uri: String,

    /// Listen port (default: 4000).
    pub port: u16,

    /// Listen host (default: "0.0.0.0").
    pub bind_host: IpAddr,

    /// Maximum JWKS endpoint requests per minute.
    pub jwks_requests_per_minute: u32,

    /// How long fetched signing keys are served from cache.
    pub jwks_cache_ttl_seconds: u64,

    /// Leeway applied to `exp`/`nbf` checks.
    pub jwt_clock_skew_seconds: u64,

    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_allowed_origins: Vec<String>,

    /// Attach Apollo Tracing data to GraphQL responses.
    pub tracing_enabled: bool,

    /// Timeout for each subgraph HTTP request.
    pub subgraph_timeout_seconds: u64,

    /// Recompose the supergraph at this interval when set.
    pub schema_poll_interval_seconds: Option<u64>,

    /// Connection drain period on shutdown.
    pub drain_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid service endpoint: {0}")]
    InvalidServiceEndpoint(String),

    #[error("Invalid auth configuration: {0}")]
    InvalidAuth(String),

    #[error("Invalid port configuration: {0}")]
    InvalidPort(String),

    #[error("Invalid bind host configuration: {0}")]
    InvalidBindHost(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid CORS configuration: {0}")]
    InvalidCors(String),

    #[error("Invalid GraphQL tracing configuration: {0}")]
    InvalidTracing(String),

    #[error("Invalid timing configuration: {0}")]
    InvalidTiming(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let service_endpoints = [
            parse_service_endpoint(vars, SERVICE_ENDPOINT_VARS[0])?,
            parse_service_endpoint(vars, SERVICE_ENDPOINT_VARS[1])?,
            parse_service_endpoint(vars, SERVICE_ENDPOINT_VARS[2])?,
        ];

        let auth_domain = required(vars, "AUTH_DOMAIN")?;
        if auth_domain.contains("://")
            || auth_domain.contains('/')
            || auth_domain.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::InvalidAuth(format!(
                "AUTH_DOMAIN must be a bare host name without scheme or path, got '{}'",
                auth_domain
            )));
        }

        let auth_audience = required(vars, "AUTH_AUDIENCE")?;

        let auth_jwks_uri = match vars.get("AUTH_JWKS_URI") {
            Some(uri) => {
                validate_http_url(uri).map_err(|reason| {
                    ConfigError::InvalidJwks(format!(
                        "AUTH_JWKS_URI must be an absolute http(s) URL, got '{}': {}",
                        uri, reason
                    ))
                })?;
                uri.clone()
            }
            None => jwks_uri_for_domain(&auth_domain),
        };

        let port = match vars.get("PORT") {
            Some(value_str) => {
                let value: u16 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidPort(format!(
                        "PORT must be an integer between 1 and 65535, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidPort(
                        "PORT must be greater than 0".to_string(),
                    ));
                }
                value
            }
            None => DEFAULT_PORT,
        };

        let bind_host_str = vars
            .get("BIND_HOST")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_HOST);
        let bind_host = IpAddr::from_str(bind_host_str).map_err(|e| {
            ConfigError::InvalidBindHost(format!(
                "BIND_HOST must be an IP address, got '{}': {}",
                bind_host_str, e
            ))
        })?;

        let jwks_requests_per_minute: u32 = parse_positive(
            vars,
            "JWKS_REQUESTS_PER_MINUTE",
            DEFAULT_JWKS_REQUESTS_PER_MINUTE,
        )
        .map_err(ConfigError::InvalidJwks)?;

        let jwks_cache_ttl_seconds: u64 = parse_positive(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidJwks)?;

        // Zero is allowed here: it means exact expiry checks.
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let cors_allowed_origins = match vars.get("CORS_ALLOWED_ORIGINS") {
            Some(list) => parse_origins(list)?,
            None => vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
        };

        let tracing_enabled = match vars.get("GRAPHQL_TRACING").map(|v| v.trim()) {
            None => true,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::InvalidTracing(format!(
                    "GRAPHQL_TRACING must be 'true' or 'false', got '{}'",
                    v
                )))
            }
        };

        let subgraph_timeout_seconds: u64 = parse_positive(
            vars,
            "SUBGRAPH_TIMEOUT_SECONDS",
            DEFAULT_SUBGRAPH_TIMEOUT_SECONDS,
        )
        .map_err(ConfigError::InvalidTiming)?;

        let schema_poll_interval_seconds = match vars.get("SCHEMA_POLL_INTERVAL_SECONDS") {
            Some(_) => Some(
                parse_positive(vars, "SCHEMA_POLL_INTERVAL_SECONDS", 0)
                    .map_err(ConfigError::InvalidTiming)?,
            ),
            None => None,
        };

        let drain_seconds = match vars.get("GATEWAY_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidTiming(format!(
                    "GATEWAY_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            service_endpoints,
            auth_domain,
            auth_audience,
            auth_jwks_uri,
            port,
            bind_host,
            jwks_requests_per_minute,
            jwks_cache_ttl_seconds,
            jwt_clock_skew_seconds,
            cors_allowed_origins,
            tracing_enabled,
            subgraph_timeout_seconds,
            schema_poll_interval_seconds,
            drain_seconds,
        })
    }

    /// The upstream services as `(name, url)` pairs, in env-var order.
    pub fn service_list(&self) -> Vec<ServiceDefinition> {
        self.service_endpoints
            .iter()
            .enumerate()
            .map(|(i, url)| ServiceDefinition::new(format!("service{}", i + 1), url.clone()))
            .collect()
    }

    /// Issuer every accepted token must carry: `https://{auth_domain}/`.
    pub fn issuer(&self) -> String {
        issuer_for_domain(&self.auth_domain)
    }

    /// Socket address the HTTP listener binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }

    /// Timeout for a whole HTTP request. Always outlasts a single subgraph
    /// call so slow subgraphs surface as GraphQL errors, not 408s.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.subgraph_timeout_seconds
                .saturating_add(REQUEST_TIMEOUT_HEADROOM_SECONDS)
                .max(MIN_REQUEST_TIMEOUT_SECONDS),
        )
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_service_endpoint(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<String, ConfigError> {
    let url = required(vars, name)?;
    validate_http_url(&url).map_err(|reason| {
        ConfigError::InvalidServiceEndpoint(format!(
            "{} must be an absolute http(s) URL, got '{}': {}",
            name, url, reason
        ))
    })?;
    Ok(url)
}

fn validate_http_url(value: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

/// Parse an optional strictly positive integer, falling back to `default`.
fn parse_positive<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, String>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value == T::default() {
        return Err(format!("{} must be greater than 0", name));
    }

    Ok(value)
}

fn parse_origins(list: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect();

    if origins.is_empty() {
        return Err(ConfigError::InvalidCors(
            "CORS_ALLOWED_ORIGINS must list at least one origin".to_string(),
        ));
    }

    for origin in &origins {
        // Credentialed CORS forbids the wildcard origin
        if origin == "*" {
            return Err(ConfigError::InvalidCors(
                "CORS_ALLOWED_ORIGINS must not contain '*' when credentials are allowed"
                    .to_string(),
            ));
        }
        validate_http_url(origin).map_err(|reason| {
            ConfigError::InvalidCors(format!(
                "CORS origin must be an absolute http(s) origin, got '{}': {}",
                origin, reason
            ))
        })?;
    }

    Ok(origins)
}
