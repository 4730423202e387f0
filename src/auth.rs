//! Bearer-token auth: bcrypt credential checks, JWT issue/verify, and the
//! `AuthUser` extractor protected routes take as an argument.

use crate::api::error::ApiError;
use crate::api::AppState;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub exp: i64,
}

pub fn issue_token(secret: &str, id: i64, username: &str, role: &str) -> Result<String, ApiError> {
    let claims = Claims {
        id,
        username: username.to_string(),
        role: role.to_string(),
        exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("token encode failed: {e}")))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::forbidden("token is invalid"))
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal(format!("password hash failed: {e}")))
}

/// Legacy seed rows store plain text; anything that does not look like a
/// bcrypt hash is compared byte-for-byte, as every prior backend generation did.
pub fn password_matches(stored: &str, given: &str) -> bool {
    if stored.starts_with("$2") {
        bcrypt::verify(given, stored).unwrap_or(false)
    } else {
        stored == given
    }
}

/// Verified bearer identity. Missing/malformed headers are a 401; a header
/// that fails verification is a 403, mirroring the original middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn require_role(&self, role: &str) -> Result<(), ApiError> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("{role} role required")))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_bearer(req))
    }
}

fn extract_bearer(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::internal("app state missing"))?;
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("token is missing"))?;
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("token is missing"))?;
    verify_token(&state.jwt_secret, token).map(AuthUser)
}
