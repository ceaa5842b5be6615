use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};

use super::model::{EmailToken, RefreshToken, Role, User};
use super::schema::ErrorResponse;
use crate::config::StoreError;
use crate::services::jwt::JwtError;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `StoreError::Conflict` naming the e-mail or username index on duplicates.
    async fn create(&self, user: &User) -> StoreResult<()>;
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()>;
    async fn mark_email_verified(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()>;
    async fn update_role(&self, user_id: &str, role: Role) -> StoreResult<()>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> StoreResult<()>;
    async fn find_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;
    /// Returns `false` when the record was already revoked.
    async fn revoke(&self, id: &str) -> StoreResult<bool>;
    async fn revoke_all_for_user(&self, user_id: &str) -> StoreResult<u64>;
    async fn delete_expired(&self) -> StoreResult<u64>;
}

/// Storage for single-use tokens bound to an e-mail address
/// (password resets and e-mail verifications live in separate tables).
#[async_trait]
pub trait EmailTokenRepository: Send + Sync {
    /// Drops any token already issued for the address, then stores `token`.
    async fn replace_for_email(&self, token: &EmailToken) -> StoreResult<()>;
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<EmailToken>>;
    async fn delete(&self, token: &str) -> StoreResult<()>;
    async fn delete_expired(&self) -> StoreResult<u64>;
}

// =============================================================================
// SERVICE RESULT TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("A user with this email already exists")]
    UserAlreadyExists,

    #[error("This username is already taken")]
    UsernameAlreadyExists,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Refresh token not found")]
    RefreshTokenNotFound,

    #[error("Verification token not found")]
    VerificationTokenNotFound,

    #[error("Verification token expired")]
    VerificationTokenExpired,

    #[error("Password reset token not found")]
    PasswordResetTokenNotFound,

    #[error("Password reset token expired")]
    PasswordResetTokenExpired,

    #[error("{0}")]
    PasswordTooWeak(String),

    #[error("New password must be different from the current password")]
    SamePassword,

    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Too many attempts, please try again later")]
    TooManyAttempts,

    #[error("JWT secret is not configured")]
    JwtSecretNotSet,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidRefreshToken
            | Self::RefreshTokenExpired
            | Self::RefreshTokenNotFound
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists | Self::UsernameAlreadyExists => StatusCode::CONFLICT,
            Self::VerificationTokenNotFound
            | Self::VerificationTokenExpired
            | Self::PasswordResetTokenNotFound
            | Self::PasswordResetTokenExpired
            | Self::PasswordTooWeak(_)
            | Self::SamePassword
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::JwtSecretNotSet | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "InvalidCredentials",
            Self::UserNotFound => "UserNotFound",
            Self::UserAlreadyExists => "UserAlreadyExists",
            Self::UsernameAlreadyExists => "UsernameAlreadyExists",
            Self::InvalidToken => "InvalidToken",
            Self::TokenExpired => "TokenExpired",
            Self::InvalidRefreshToken => "InvalidRefreshToken",
            Self::RefreshTokenExpired => "RefreshTokenExpired",
            Self::RefreshTokenNotFound => "RefreshTokenNotFound",
            Self::VerificationTokenNotFound => "VerificationTokenNotFound",
            Self::VerificationTokenExpired => "VerificationTokenExpired",
            Self::PasswordResetTokenNotFound => "PasswordResetTokenNotFound",
            Self::PasswordResetTokenExpired => "PasswordResetTokenExpired",
            Self::PasswordTooWeak(_) => "PasswordTooWeak",
            Self::SamePassword => "SamePassword",
            Self::Validation(_) => "ValidationError",
            Self::Unauthorized => "Unauthorized",
            Self::InsufficientPermissions => "InsufficientPermissions",
            Self::TooManyAttempts => "TooManyAttempts",
            Self::JwtSecretNotSet => "JWTSecretNotSet",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Store(_) | Self::Internal(_) => "InternalServerError",
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::SecretNotSet => AuthError::JwtSecretNotSet,
            JwtError::InvalidToken => AuthError::InvalidToken,
            JwtError::TokenExpired => AuthError::TokenExpired,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal error in auth path");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        // Login failures keep one fixed body whatever the cause.
        let body = match self {
            Self::InvalidCredentials => ErrorResponse::new(message),
            _ => ErrorResponse::with_code(message, self.code()),
        };

        (status, Json(body)).into_response()
    }
}
