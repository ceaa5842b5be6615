//! Access/refresh token issuance and rotation.
//!
//! Two concurrent rotations of the same refresh secret race on `revoke`, which only
//! succeeds for the caller that flips `revoked` from false to true; the loser gets
//! `InvalidRefreshToken` and no second pair is minted.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::interface::{AuthError, RefreshTokenRepository, TokenPair};
use super::model::{RefreshToken, User};
use crate::services::hashing::{constant_time_eq, sha256_hex};
use crate::services::jwt::{Claims, JwtService};

pub struct TokenMinter {
    jwt: Arc<JwtService>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl TokenMinter {
    pub fn new(jwt: Arc<JwtService>, refresh_tokens: Arc<dyn RefreshTokenRepository>) -> Self {
        Self {
            jwt,
            refresh_tokens,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Signs an access token and stores the hash of a new refresh secret bound to its JTI.
    /// The raw secret only ever leaves through the returned pair.
    pub async fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access = self
            .jwt
            .create_access_token(&user.id, &user.email, user.role)?;

        let refresh_secret = self.jwt.generate_refresh_secret();
        let now = Utc::now();

        let record = RefreshToken {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token_hash: sha256_hex(&refresh_secret),
            access_token_jti: access.jti.clone(),
            expires_at: now + self.jwt.refresh_token_duration(),
            created_at: now,
            last_used_at: None,
            revoked: false,
            revoked_at: None,
        };
        self.refresh_tokens.create(&record).await?;

        tracing::debug!(user_id = %user.id, jti = %access.jti, "Issued token pair");

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh_secret,
            expires_in: access.expires_in,
        })
    }

    pub fn validate(&self, access_token: &str) -> Result<Claims, AuthError> {
        Ok(self.jwt.verify_access_token(access_token)?)
    }

    /// Resolves the refresh record for `refresh_secret` and revokes it, returning the owner id.
    /// Callers load the user and call `issue` for the replacement pair.
    pub async fn consume_refresh(&self, refresh_secret: &str) -> Result<String, AuthError> {
        if refresh_secret.trim().is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let token_hash = sha256_hex(refresh_secret);
        let record = self
            .refresh_tokens
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !constant_time_eq(&record.token_hash, &token_hash) {
            return Err(AuthError::InvalidRefreshToken);
        }

        if record.revoked {
            // Presenting a rotated-away secret is a replay of a single-use token.
            if record.revoked_at.is_some() && record.last_used_at.is_some() {
                tracing::warn!(user_id = %record.user_id, "Rotated refresh token presented again");
                return Err(AuthError::InvalidRefreshToken);
            }
            return Err(AuthError::RefreshTokenExpired);
        }

        if !record.is_usable(Utc::now()) {
            return Err(AuthError::RefreshTokenExpired);
        }

        if !self.refresh_tokens.revoke(&record.id).await? {
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(record.user_id)
    }

    pub async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError> {
        Ok(self.refresh_tokens.revoke_all_for_user(user_id).await?)
    }
}
