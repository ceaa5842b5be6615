use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Anti-replay nonce for one provider redirect.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthState {
    pub state: String,
    pub provider: String,
    pub redirect_url: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Binds a provider identity to a local user.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FederatedAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub provider_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Provider profile reduced to the fields the service relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}
