use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::model::{FederatedAccount, OAuthState};
use crate::config::StoreError;
use crate::modules::auth::interface::{AuthError, StoreResult};
use crate::modules::auth::schema::ErrorResponse;

#[async_trait]
pub trait OAuthStateRepository: Send + Sync {
    async fn create(&self, state: &OAuthState) -> StoreResult<()>;
    async fn find(&self, state: &str) -> StoreResult<Option<OAuthState>>;
    /// Returns `false` when another caller already consumed the state.
    async fn delete(&self, state: &str) -> StoreResult<bool>;
    async fn delete_expired(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `StoreError::Conflict` when `(provider, provider_account_id)` is taken.
    async fn create(&self, account: &FederatedAccount) -> StoreResult<()>;
    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<FederatedAccount>>;
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<FederatedAccount>>;
    /// Returns `false` when nothing was linked for that provider.
    async fn delete_for_user(&self, user_id: &str, provider: &str) -> StoreResult<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Provider {0} is not configured")]
    ProviderNotConfigured(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid or unknown OAuth state")]
    InvalidState,

    #[error("OAuth state expired")]
    StateExpired,

    #[error("OAuth state was issued for a different provider")]
    ProviderMismatch,

    #[error("Provider {0} does not support PKCE")]
    PkceNotSupported(String),

    #[error("Provider denied authorization: {0}")]
    AuthorizationDenied(String),

    #[error("Token exchange with provider failed: {0}")]
    TokenExchange(String),

    #[error("Fetching provider profile failed: {0}")]
    UserInfo(String),

    #[error("Provider did not return an email address")]
    MissingEmail,

    #[error("An account with this email exists; sign in and link the provider instead")]
    UnverifiedEmail,

    #[error("This provider account is already linked to another user")]
    AccountAlreadyLinked,

    #[error("No linked account for this provider")]
    AccountNotLinked,

    #[error("Cannot unlink the only remaining login method")]
    CannotUnlinkLastLoginMethod,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        OAuthError::Auth(AuthError::Store(err))
    }
}

impl OAuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedProvider(_)
            | Self::ProviderNotConfigured(_)
            | Self::MissingParameter(_)
            | Self::InvalidState
            | Self::StateExpired
            | Self::ProviderMismatch
            | Self::PkceNotSupported(_)
            | Self::AuthorizationDenied(_)
            | Self::MissingEmail
            | Self::CannotUnlinkLastLoginMethod => StatusCode::BAD_REQUEST,
            Self::TokenExchange(_) | Self::UserInfo(_) => StatusCode::BAD_GATEWAY,
            Self::AccountAlreadyLinked | Self::UnverifiedEmail => StatusCode::CONFLICT,
            Self::AccountNotLinked => StatusCode::NOT_FOUND,
            Self::Auth(e) => e.status_code(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedProvider(_) => "UnsupportedProvider",
            Self::ProviderNotConfigured(_) => "ProviderNotConfigured",
            Self::MissingParameter(_) => "MissingParameter",
            Self::InvalidState => "InvalidOAuthState",
            Self::StateExpired => "OAuthStateExpired",
            Self::ProviderMismatch => "ProviderMismatch",
            Self::PkceNotSupported(_) => "PkceNotSupported",
            Self::AuthorizationDenied(_) => "AuthorizationDenied",
            Self::TokenExchange(_) => "ProviderTokenExchangeFailed",
            Self::UserInfo(_) => "ProviderUserInfoFailed",
            Self::MissingEmail => "ProviderEmailMissing",
            Self::UnverifiedEmail => "ProviderEmailUnverified",
            Self::AccountAlreadyLinked => "AccountAlreadyLinked",
            Self::AccountNotLinked => "AccountNotLinked",
            Self::CannotUnlinkLastLoginMethod => "CannotUnlinkLastLoginMethod",
            Self::Auth(e) => e.code(),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(e) => e.into_response(),
            Self::TokenExchange(ref detail) | Self::UserInfo(ref detail) => {
                tracing::warn!(error = %detail, "Identity provider call failed");
                (
                    self.status_code(),
                    Json(ErrorResponse::with_code(
                        "Identity provider request failed",
                        self.code(),
                    )),
                )
                    .into_response()
            }
            other => (
                other.status_code(),
                Json(ErrorResponse::with_code(other.to_string(), other.code())),
            )
                .into_response(),
        }
    }
}
