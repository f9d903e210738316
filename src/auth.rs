//! Bearer-token authentication.
//!
//! Tokens are issued elsewhere; this service only checks them. The `sub`
//! claim is the owner id stored on video records.

use crate::errors::AppError;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Expected `iss` claim of access tokens.
pub const TOKEN_ISSUER: &str = "video-store-access";

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no authorization header included")]
    MissingHeader,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token subject `{0}` is not a user id")]
    InvalidSubject(String),
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Check signature, expiry and issuer; return the caller's user id.
pub fn validate_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject(data.claims.sub))
}

/// Resolve the caller from request headers, or 401.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Uuid, AppError> {
    let token = bearer_token(headers).map_err(|err| {
        tracing::debug!(error = %err, "rejected request without usable bearer token");
        AppError::unauthorized("Couldn't find JWT")
    })?;
    validate_jwt(token, secret).map_err(|err| {
        tracing::debug!(error = %err, "rejected bearer token");
        AppError::unauthorized("Couldn't validate JWT")
    })
}

/// Sign an access token for `user_id`. Only tests mint tokens.
#[cfg(test)]
pub fn make_jwt(user_id: Uuid, secret: &str, ttl: chrono::Duration) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = chrono::Utc::now();
    let claims = AccessClaims {
        iss: TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
