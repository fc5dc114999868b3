//! RS256 token minting with fixed test keys.
//!
//! The keys under `src/keys/` are throwaway 2048-bit RSA keys used only by
//! tests. Each keypair knows its public modulus so it can publish itself in a
//! JWKS document.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

const PRIMARY_PEM: &str = include_str!("keys/primary.pem");
const PRIMARY_N: &str = "l2DI5unKLWrITU5LsLaOn_i6YGNNvXuXGBAl7FqD4wM1GdN_cDbX8PxL8TB9O-5046yt7YU5xvL24SWMKz4vgvgSgduSK_ORXbOy9Xh3kDo8DGv545YJFylC_4uQDa8986cII9fpTupOFjjWPwsxW_9_Q3ggCKnYUtSYSt4UALg1NhNSCxtq4JMgsimtFV5sz-bDJYHpBP2rIzrSX15MWbwzN3JnP1gYkBYMgUwK-P_vbopN89-m7NlUjjsadSg7ssKt9geOAJPvY2IIYdnJbn4Ap-vpsek8h7OlEFreIQiDRcvmb0AwRupLAYOe47SJ4V0EzrZ1zIjUKXHu2Qxq7w";

const SECONDARY_PEM: &str = include_str!("keys/secondary.pem");
const SECONDARY_N: &str = "6o2HB5qJE4RIKWLPBQmeVYgr0hvRJyrCyyOSBZtjmVb2Z46todlt9Y0iM_7J15n9yzxC8upkT4qFUyU4C2Ad9lvcMQMi_r8U31kayNB4o9ZnDJ-7yEAW_oBXf41JRerVG0CPuokWgVu3E-KbmgJtiVKoUp5JwVDZ7cdTk6bKzdOUAYFRQltnvjpL4B1b1j7OZMU_PIeoRAtLDN2FzG4e4IKhHiWJxIkg4yDN4ZEeJSzpx9-IXh_pww0-19o8aFb7sdD4vWAi-g3oQi_4Som1NkGhO0alwME9lICTSiM7EKjHHqjxJRsh0uuxhVkAi9cTl3M3tNpgMsOeexRFVYixEQ";

/// Public exponent shared by both test keys (65537).
const EXPONENT: &str = "AQAB";

/// RSA keypair for signing test tokens.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    kid: String,
    private_pem: &'static str,
    modulus: &'static str,
}

impl TestKeypair {
    /// The key published by default in test JWKS documents.
    pub fn primary() -> Self {
        Self {
            kid: "test-key-primary".to_string(),
            private_pem: PRIMARY_PEM,
            modulus: PRIMARY_N,
        }
    }

    /// A second key, e.g. for rotation tests or "unknown signer" cases.
    pub fn secondary() -> Self {
        Self {
            kid: "test-key-secondary".to_string(),
            private_pem: SECONDARY_PEM,
            modulus: SECONDARY_N,
        }
    }

    /// Same key material under a different `kid`.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign `claims` with RS256 and this key's `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign `claims` with an arbitrary RS-family header.
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        let key = EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .expect("test key should be valid PEM");
        encode(header, claims, &key).expect("Failed to sign token")
    }

    /// This key as a JWK.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus,
            "e": EXPONENT
        })
    }
}

/// A JWKS document publishing `keys`.
pub fn jwks_json(keys: &[&TestKeypair]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>() })
}

/// Claims that pass validation for `issuer` and `audience`, valid for an hour.
pub fn valid_claims(issuer: &str, audience: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "auth0|test-user",
        "iss": issuer,
        "aud": audience,
        "iat": now,
        "exp": now + 3600,
        "scope": "read:products write:orders"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    #[test]
    fn test_signed_token_verifies_with_published_key() {
        let keypair = TestKeypair::primary();
        let token = keypair.sign(&valid_claims("https://tenant.example/", "api"));

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("test-key-primary"));

        let key = DecodingKey::from_rsa_components(PRIMARY_N, EXPONENT).unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["api"]);
        let data = decode::<Value>(&token, &key, &validation).unwrap();
        assert_eq!(data.claims["iss"], "https://tenant.example/");
    }

    #[test]
    fn test_keys_differ() {
        let primary = TestKeypair::primary().jwk_json();
        let secondary = TestKeypair::secondary().jwk_json();
        assert_ne!(primary["n"], secondary["n"]);
        assert_ne!(primary["kid"], secondary["kid"]);
    }

    #[test]
    fn test_jwks_json() {
        let primary = TestKeypair::primary();
        let rotated = TestKeypair::secondary().with_kid("rotated");
        let jwks = jwks_json(&[&primary, &rotated]);

        assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
        assert_eq!(jwks["keys"][1]["kid"], "rotated");
    }
}
