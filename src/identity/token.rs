//! Bearer token issue/verify. Tokens are stateless HS256 JWTs carrying the
//! caller's email and claimed role with a fixed 24-hour lifetime; validity
//! is signature plus expiry only. Account existence and the authoritative
//! role are the resolver's concern, not this layer's.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::authorizer::Role;

pub const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies bearer tokens with a process-wide symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        TokenService { secret: secret.into() }
    }

    /// Produce a signed token for the given identity. Pure function of the
    /// inputs, the current time and the secret.
    pub fn issue(&self, email: &str, role: Role) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            email: email.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal { code: "token_encode".into(), message: e.to_string() })
    }

    /// Verify signature and expiry, returning the embedded claims. The role
    /// claim is a hint only; callers resolve the authoritative role against
    /// the account stores.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::auth("expired_token", "token has expired")
                }
                _ => AppError::auth("invalid_token", "invalid token"),
            })
    }
}
