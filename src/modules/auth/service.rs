use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use super::interface::{AuthError, EmailTokenRepository, TokenPair, UserRepository};
use super::model::{EmailToken, Role, User};
use super::tokens::TokenMinter;
use crate::services::email::{password_reset_email, verification_email, EmailSender};
use crate::services::hashing;
use crate::services::jwt::{generate_opaque_token, Claims};

static EMAIL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static USERNAME_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,30}$").expect("valid username regex"));

const VERIFICATION_TTL_HOURS: i64 = 24;
const PASSWORD_RESET_TTL_HOURS: i64 = 1;

pub fn looks_like_email(identifier: &str) -> bool {
    EMAIL_FORMAT.is_match(identifier)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// Credential lifecycle: registration, login, rotation, password and verification flows.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenMinter,
    password_resets: Arc<dyn EmailTokenRepository>,
    verifications: Arc<dyn EmailTokenRepository>,
    mailer: Arc<dyn EmailSender>,
    app_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenMinter,
        password_resets: Arc<dyn EmailTokenRepository>,
        verifications: Arc<dyn EmailTokenRepository>,
        mailer: Arc<dyn EmailSender>,
        app_url: String,
    ) -> Self {
        Self {
            users,
            tokens,
            password_resets,
            verifications,
            mailer,
            app_url,
        }
    }

    pub fn tokens(&self) -> &TokenMinter {
        &self.tokens
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.validate(token)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn register(&self, input: RegisterInput) -> Result<User, AuthError> {
        let email = normalize_email(&input.email);
        let username = input.username.trim().to_string();

        if !looks_like_email(&email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }
        if !USERNAME_FORMAT.is_match(&username) {
            return Err(AuthError::Validation(
                "Username must be 3-30 characters of letters, digits, '.', '_' or '-'".to_string(),
            ));
        }
        let role = input.role.unwrap_or_default();
        if role == Role::Admin {
            return Err(AuthError::Validation("Invalid role".to_string()));
        }
        hashing::validate_strength(&input.password).map_err(AuthError::PasswordTooWeak)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }
        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameAlreadyExists);
        }

        let password_hash = hashing::hash_password(&input.password)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: input
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| username.clone()),
            username,
            email,
            bio: None,
            image: None,
            password_hash: Some(password_hash),
            role,
            email_verified: None,
            two_factor_enabled: false,
            created_at: now,
            updated_at: now,
        };

        // Concurrent registrations are settled by the unique indexes.
        self.users.create(&user).await.map_err(|e| {
            if e.is_conflict_on("username") {
                AuthError::UsernameAlreadyExists
            } else if e.is_conflict_on("email") {
                AuthError::UserAlreadyExists
            } else {
                AuthError::Store(e)
            }
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        if let Err(e) = self.initiate_email_verification(&user).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to initiate email verification");
        }

        Ok(user)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let identifier = identifier.trim();

        let user = if looks_like_email(identifier) {
            self.users.find_by_email(&normalize_email(identifier)).await?
        } else {
            self.users.find_by_username(identifier).await?
        };

        let Some(user) = user else {
            hashing::dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.as_deref() else {
            hashing::dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        let is_valid = hashing::verify_password(password, hash)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.tokens.issue(&user).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok((user, pair))
    }

    /// The only path that mints an access token without credentials.
    pub async fn rotate_tokens(&self, refresh_secret: &str) -> Result<(User, TokenPair), AuthError> {
        let user_id = self.tokens.consume_refresh(refresh_secret).await?;

        let user = self
            .users
            .find_by_id(&user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let pair = self.tokens.issue(&user).await?;
        Ok((user, pair))
    }

    pub async fn logout(&self, user_id: &str) -> Result<(), AuthError> {
        let revoked = self.tokens.revoke_all(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.get_user(user_id).await?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        let is_valid = hashing::verify_password(current_password, hash)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AuthError::SamePassword);
        }
        hashing::validate_strength(new_password).map_err(AuthError::PasswordTooWeak)?;

        let new_hash =
            hashing::hash_password(new_password).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.users.update_password(&user.id, &new_hash).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Always succeeds for unknown addresses so callers cannot probe for accounts.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(());
        };

        let token = self
            .store_email_token(&self.password_resets, &user.email, PASSWORD_RESET_TTL_HOURS)
            .await?;
        self.dispatch(password_reset_email(&self.app_url, &user.email, &token));

        tracing::info!(user_id = %user.id, "Password reset initiated");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let record = self
            .password_resets
            .find_by_token(token)
            .await?
            .filter(|r| !r.used)
            .ok_or(AuthError::PasswordResetTokenNotFound)?;

        if !hashing::constant_time_eq(&record.token, token) {
            return Err(AuthError::PasswordResetTokenNotFound);
        }
        if record.is_expired(Utc::now()) {
            self.password_resets.delete(&record.token).await?;
            return Err(AuthError::PasswordResetTokenExpired);
        }

        hashing::validate_strength(new_password).map_err(AuthError::PasswordTooWeak)?;

        let user = self
            .users
            .find_by_email(&record.email)
            .await?
            .ok_or(AuthError::PasswordResetTokenNotFound)?;

        if let Some(current) = user.password_hash.as_deref() {
            let reused = hashing::verify_password(new_password, current)
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            if reused {
                return Err(AuthError::SamePassword);
            }
        }

        let new_hash =
            hashing::hash_password(new_password).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.users.update_password(&user.id, &new_hash).await?;
        self.password_resets.delete(&record.token).await?;
        self.tokens.revoke_all(&user.id).await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    /// Stores a fresh verification token for the user's address and sends it in the background.
    pub async fn initiate_email_verification(&self, user: &User) -> Result<(), AuthError> {
        let token = self
            .store_email_token(&self.verifications, &user.email, VERIFICATION_TTL_HOURS)
            .await?;
        self.dispatch(verification_email(&self.app_url, &user.email, &token));
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<(User, TokenPair), AuthError> {
        let record = self
            .verifications
            .find_by_token(token)
            .await?
            .filter(|r| !r.used)
            .ok_or(AuthError::VerificationTokenNotFound)?;

        if !hashing::constant_time_eq(&record.token, token) {
            return Err(AuthError::VerificationTokenNotFound);
        }
        if record.is_expired(Utc::now()) {
            self.verifications.delete(&record.token).await?;
            return Err(AuthError::VerificationTokenExpired);
        }

        let mut user = self
            .users
            .find_by_email(&record.email)
            .await?
            .ok_or(AuthError::VerificationTokenNotFound)?;

        if user.email_verified.is_none() {
            let now = Utc::now();
            self.users.mark_email_verified(&user.id, now).await?;
            user.email_verified = Some(now);
        }
        self.verifications.delete(&record.token).await?;

        let pair = self.tokens.issue(&user).await?;
        tracing::info!(user_id = %user.id, "Email verified");

        Ok((user, pair))
    }

    /// Same outcome whether or not the address belongs to an account.
    pub async fn resend_email_verification(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        match self.users.find_by_email(&email).await? {
            Some(user) if !user.is_email_verified() => self.initiate_email_verification(&user).await,
            _ => Ok(()),
        }
    }

    async fn store_email_token(
        &self,
        repo: &Arc<dyn EmailTokenRepository>,
        email: &str,
        ttl_hours: i64,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let record = EmailToken {
            token: generate_opaque_token(),
            email: email.to_string(),
            expires_at: now + Duration::hours(ttl_hours),
            used: false,
            created_at: now,
        };
        repo.replace_for_email(&record).await?;
        Ok(record.token)
    }

    fn dispatch(&self, email: crate::services::email::OutgoingEmail) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let to = email.to.clone();
            if let Err(e) = mailer.send(email).await {
                tracing::warn!(to = %to, error = %e, "Email delivery failed");
            }
        });
    }
}
