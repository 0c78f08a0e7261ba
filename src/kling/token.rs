//! Short-lived bearer tokens for the KlingAI API.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Token lifetime in seconds.
pub const TOKEN_TTL_SECS: i64 = 1800;

/// Backdating of `nbf` to tolerate clock skew with the API.
pub const NOT_BEFORE_SKEW_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub exp: i64,
    pub nbf: i64,
}

impl Claims {
    pub fn issued_at(access_key: &str, now: i64) -> Self {
        Self {
            iss: access_key.to_string(),
            exp: now + TOKEN_TTL_SECS,
            nbf: now - NOT_BEFORE_SKEW_SECS,
        }
    }
}

/// Sign an HS256 token for `access_key` valid from `now`.
pub fn sign_token(
    access_key: &str,
    secret_key: &str,
    now: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        &Claims::issued_at(access_key, now),
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
}

/// Sign a token valid from the current wall clock.
pub fn fresh_token(access_key: &str, secret_key: &str) -> Result<String, jsonwebtoken::errors::Error> {
    sign_token(access_key, secret_key, chrono::Utc::now().timestamp())
}
