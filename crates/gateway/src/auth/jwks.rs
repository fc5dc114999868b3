//! JWKS client for fetching and caching token signing keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the
//! authorization server's `/.well-known/jwks.json` endpoint and caches them
//! with a configurable TTL.
//!
//! # Security
//!
//! - Keys are cached to reduce load on the authorization server
//! - An unknown `kid` forces a refetch so rotated keys are picked up
//! - Every fetch goes through a `governor` rate limiter
//! - Only RSA signing keys are retained

use crate::errors::GatewayError;
use crate::observability::metrics::record_jwks_fetch;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default timeout for JWKS requests in seconds.
const JWKS_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Quota for JWKS fetches: a burst of `requests_per_minute`, refilled at
/// that rate. Zero is treated as one.
fn jwks_quota(requests_per_minute: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN))
}

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for usable keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256" when present).
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" when present).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Whether this key can verify RS256 signatures.
    pub fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && self.kid.as_deref().is_some_and(|kid| !kid.is_empty())
            && self.n.is_some()
            && self.e.is_some()
            && self.key_use.as_deref().map_or(true, |u| u == "sig")
            && self.alg.as_deref().map_or(true, |a| a == "RS256")
    }
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this cache entry was filled.
    fetched_at: Instant,

    /// When this cache entry expires.
    expires_at: Instant,
}

/// JWKS client for fetching and caching public keys.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: RwLock<Option<CachedJwks>>,

    /// Serializes refreshes so concurrent misses share one fetch.
    refresh_lock: Mutex<()>,

    /// Cap on requests to the JWKS endpoint.
    rate_limiter: DefaultDirectRateLimiter,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a new JWKS client.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the JWKS endpoint
    /// * `cache_ttl` - How long to cache JWKS before refreshing
    /// * `requests_per_minute` - Maximum JWKS fetches per minute
    pub fn new(jwks_url: String, cache_ttl: Duration, requests_per_minute: u32) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(JWKS_REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            rate_limiter: RateLimiter::direct(jwks_quota(requests_per_minute)),
            cache_ttl,
        }
    }

    /// The JWKS endpoint this client reads.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Get a JWK by key ID.
    ///
    /// Serves from cache while it is fresh. A miss, an expired cache, or a
    /// `kid` unknown to a fresh cache triggers one (rate limited) refetch.
    ///
    /// # Errors
    ///
    /// - `GatewayError::ServiceUnavailable` if the JWKS cannot be fetched or
    ///   the rate limit is exhausted
    /// - `GatewayError::SigningKeyNotFound` if the key ID is not published
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, GatewayError> {
        let request_started = Instant::now();

        if let Some(key) = self.cached_key(kid, request_started).await {
            tracing::debug!(target: "gateway.auth.jwks", kid = %kid, "JWKS cache hit");
            return Ok(key);
        }

        {
            let _guard = self.refresh_lock.lock().await;

            // Another request may have refreshed while we waited for the lock
            let refreshed_meanwhile = {
                let cache = self.cache.read().await;
                cache
                    .as_ref()
                    .is_some_and(|cached| cached.fetched_at >= request_started)
            };

            if !refreshed_meanwhile {
                if self.rate_limiter.check().is_err() {
                    tracing::warn!(target: "gateway.auth.jwks", kid = %kid, "JWKS rate limit exceeded");
                    record_jwks_fetch("rate_limited");
                    return Err(GatewayError::ServiceUnavailable(
                        "JWKS request rate limit exceeded".to_string(),
                    ));
                }
                self.refresh_cache().await?;
            }
        }

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "gateway.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(GatewayError::SigningKeyNotFound)
    }

    async fn cached_key(&self, kid: &str, now: Instant) -> Option<Jwk> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > now)
            .and_then(|cached| cached.keys.get(kid))
            .cloned()
    }

    /// Refresh the JWKS cache by fetching from the authorization server.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), GatewayError> {
        tracing::debug!(target: "gateway.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS");
                record_jwks_fetch("error");
                GatewayError::ServiceUnavailable("Authentication service unavailable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gateway.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            record_jwks_fetch("error");
            return Err(GatewayError::ServiceUnavailable(
                "Authentication service unavailable".to_string(),
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to parse JWKS response");
            record_jwks_fetch("error");
            GatewayError::ServiceUnavailable("Authentication service unavailable".to_string())
        })?;

        let published = jwks.keys.len();
        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter(Jwk::is_rs256_signing_key)
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();

        tracing::info!(
            target: "gateway.auth.jwks",
            key_count = keys.len(),
            skipped = published - keys.len(),
            "JWKS cache refreshed"
        );
        record_jwks_fetch("success");

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });

        Ok(())
    }

    /// Whether any signing keys are currently cached (fresh or stale).
    #[cfg(test)]
    pub async fn has_cached_keys(&self) -> bool {
        let cache = self.cache.read().await;
        cache.as_ref().is_some_and(|cached| !cached.keys.is_empty())
    }

    /// Clear the cache.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}
