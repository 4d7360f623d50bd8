//! Credential hashing and bearer-token issuance/verification.
//!
//! Passwords are hashed with argon2 (salted, adaptive). Session tokens are
//! HS256 JWTs carrying the user uuid in `sub`, signed with the configured
//! secret and expiring after `token_ttl_hours`.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::response::ApiError;
use crate::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,
    #[error("Invalid Authorization header")]
    InvalidAuthHeader,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User uuid
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password with a freshly generated salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash. A malformed stored hash is
/// treated as a failed verification rather than an error.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Issue a signed token embedding the user uuid.
pub fn issue_token(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify a token signature and expiry, returning the claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let validation = Validation::default();
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
}

/// Extractor for handlers behind bearer authentication.
///
/// Rejects with 401 when the `Authorization: Bearer <token>` header is
/// missing, malformed, improperly signed, or expired. On success carries
/// the authenticated user's uuid.
pub struct AuthUser(pub String);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?;

        let token = header
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = verify_token(token, &state.config.auth.jwt_secret)?;
        Ok(AuthUser(claims.sub))
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::TokenExpired
            | AuthError::InvalidToken => ApiError::unauthorized(e.to_string()),
            AuthError::Hashing(_) | AuthError::Encoding(_) => ApiError::internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_hash_fails_verification() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trip() {
        let token = issue_token("user-1", "secret", 24).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_rejected() {
        let token = issue_token("user-1", "secret", -1).unwrap();
        let err = verify_token(&token, "secret").unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token("user-1", "secret", 24).unwrap();
        let err = verify_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn garbage_token_rejected() {
        let err = verify_token("not.a.jwt", "secret").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
