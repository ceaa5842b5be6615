use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::auth::model::Role;

pub const ISSUER: &str = "leornian-auth-service";
pub const AUDIENCE: &str = "leornian-api";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    #[error("JWT secret is not set")]
    SecretNotSet,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}

/// A freshly signed access token together with the identifiers it was minted with.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_in: i64,
}

/// Signs and validates HMAC bearer tokens.
pub struct JwtService {
    secret: String,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self::with_lifetimes(secret, 15 * 60, 7 * 24 * 60 * 60)
    }

    pub fn with_lifetimes(secret: String, access_secs: i64, refresh_secs: i64) -> Self {
        Self {
            secret,
            access_token_duration: Duration::seconds(access_secs),
            refresh_token_duration: Duration::seconds(refresh_secs),
        }
    }

    pub fn create_access_token(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
    ) -> Result<SignedAccessToken, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::SecretNotSet);
        }

        let now = Utc::now();
        let exp = now + self.access_token_duration;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role,
            jti: jti.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: exp.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: user_id.to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            JwtError::InvalidToken
        })?;

        Ok(SignedAccessToken {
            token,
            jti,
            expires_in: self.access_token_duration.num_seconds(),
        })
    }

    /// Accepts only HMAC-signed tokens issued by this service for this audience.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::SecretNotSet);
        }
        if token.trim().is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::InvalidToken,
        })
    }

    /// 32 bytes of OS randomness, URL-safe base64 without padding.
    pub fn generate_refresh_secret(&self) -> String {
        generate_opaque_token()
    }

    pub fn get_access_token_duration_secs(&self) -> i64 {
        self.access_token_duration.num_seconds()
    }

    pub fn refresh_token_duration(&self) -> Duration {
        self.refresh_token_duration
    }
}

/// Random URL-safe secret used for refresh, reset, verification and state tokens.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
