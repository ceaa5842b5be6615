use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::interface::{AccountRepository, OAuthError, OAuthStateRepository};
use super::model::{FederatedAccount, NormalizedUser, OAuthState};
use crate::config::oauth::{OAuthProvider, ProviderConfig, ProviderRegistry};
use crate::modules::auth::interface::{AuthError, UserRepository};
use crate::modules::auth::model::{Role, User};
use crate::modules::auth::service::normalize_email;
use crate::services::identity_provider::{ProviderClient, ProviderError};
use crate::services::jwt::generate_opaque_token;

const STATE_TTL_MINUTES: i64 = 10;
const USERNAME_ATTEMPTS: usize = 5;

/// Which provider registry a call site draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Web,
    Mobile,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub profile: NormalizedUser,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: User,
    pub is_new_user: bool,
}

impl From<ProviderError> for OAuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingEmail => OAuthError::MissingEmail,
            other => OAuthError::UserInfo(other.to_string()),
        }
    }
}

pub fn parse_provider(name: &str) -> Result<OAuthProvider, OAuthError> {
    name.parse()
        .map_err(|_| OAuthError::UnsupportedProvider(name.to_string()))
}

/// Authorization-code exchange with external identity providers and the
/// account links that result from it.
pub struct OAuthService {
    client: ProviderClient,
    web: ProviderRegistry,
    mobile: ProviderRegistry,
    states: Arc<dyn OAuthStateRepository>,
    accounts: Arc<dyn AccountRepository>,
    users: Arc<dyn UserRepository>,
}

impl OAuthService {
    pub fn new(
        client: ProviderClient,
        web: ProviderRegistry,
        mobile: ProviderRegistry,
        states: Arc<dyn OAuthStateRepository>,
        accounts: Arc<dyn AccountRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            client,
            web,
            mobile,
            states,
            accounts,
            users,
        }
    }

    fn provider_config(
        &self,
        provider: OAuthProvider,
        kind: ClientKind,
    ) -> Result<&ProviderConfig, OAuthError> {
        let registry = match kind {
            ClientKind::Web => &self.web,
            ClientKind::Mobile => &self.mobile,
        };
        registry
            .get(provider)
            .ok_or_else(|| OAuthError::ProviderNotConfigured(provider.to_string()))
    }

    pub async fn get_authorization_url(
        &self,
        provider: OAuthProvider,
        redirect_url: Option<String>,
    ) -> Result<AuthorizationRedirect, OAuthError> {
        let config = self.provider_config(provider, ClientKind::Web)?;

        let now = Utc::now();
        let record = OAuthState {
            state: generate_opaque_token(),
            provider: provider.as_str().to_string(),
            redirect_url: redirect_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| config.redirect_uri.clone()),
            expires_at: now + Duration::minutes(STATE_TTL_MINUTES),
            created_at: now,
        };
        self.states.create(&record).await?;

        let url = build_authorization_url(provider, config, &record.state)?;
        tracing::debug!(provider = %provider, "Issued authorization URL");

        Ok(AuthorizationRedirect {
            url,
            state: record.state,
        })
    }

    pub async fn handle_callback(
        &self,
        provider: OAuthProvider,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<CallbackOutcome, OAuthError> {
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(OAuthError::MissingParameter("code"))?;
        let state = state
            .filter(|s| !s.is_empty())
            .ok_or(OAuthError::MissingParameter("state"))?;
        let config = self.provider_config(provider, ClientKind::Web)?;

        let record = self
            .states
            .find(state)
            .await?
            .ok_or(OAuthError::InvalidState)?;

        if record.is_expired(Utc::now()) {
            self.states.delete(&record.state).await?;
            return Err(OAuthError::StateExpired);
        }
        if record.provider != provider.as_str() {
            return Err(OAuthError::ProviderMismatch);
        }
        // Only the caller whose delete removed the row may redeem the code.
        if !self.states.delete(&record.state).await? {
            tracing::warn!(provider = %provider, "OAuth state consumed concurrently");
            return Err(OAuthError::InvalidState);
        }

        let access_token = self
            .client
            .exchange_code(config, code, &config.redirect_uri, None)
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;
        let profile = self.client.fetch_user(provider, config, &access_token).await?;

        Ok(CallbackOutcome {
            profile,
            redirect_url: record.redirect_url,
        })
    }

    /// PKCE variant used by native apps; no state record is involved.
    pub async fn handle_mobile_callback(
        &self,
        provider: OAuthProvider,
        code: &str,
        code_verifier: &str,
        redirect_uri: Option<&str>,
    ) -> Result<NormalizedUser, OAuthError> {
        if code.is_empty() {
            return Err(OAuthError::MissingParameter("code"));
        }
        if code_verifier.is_empty() {
            return Err(OAuthError::MissingParameter("code_verifier"));
        }
        let config = self.provider_config(provider, ClientKind::Mobile)?;
        if !config.supports_pkce {
            return Err(OAuthError::PkceNotSupported(provider.to_string()));
        }

        let redirect_uri = redirect_uri
            .filter(|u| !u.is_empty())
            .unwrap_or(&config.redirect_uri);

        let access_token = self
            .client
            .exchange_code(config, code, redirect_uri, Some(code_verifier))
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

        Ok(self.client.fetch_user(provider, config, &access_token).await?)
    }

    /// Existing link first, then a local account with the same provider-verified
    /// address, then a new user.
    pub async fn resolve_user(
        &self,
        provider: OAuthProvider,
        profile: &NormalizedUser,
    ) -> Result<ResolvedUser, OAuthError> {
        if let Some(link) = self
            .accounts
            .find_by_provider_account(provider.as_str(), &profile.id)
            .await?
        {
            let user = self
                .users
                .find_by_id(&link.user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;
            return Ok(ResolvedUser {
                user,
                is_new_user: false,
            });
        }

        let email = normalize_email(&profile.email);
        if let Some(user) = self.users.find_by_email(&email).await? {
            // An unverified provider address proves nothing about the local account.
            if !profile.email_verified {
                tracing::warn!(user_id = %user.id, provider = %provider, "Refused to link provider with unverified email");
                return Err(OAuthError::UnverifiedEmail);
            }
            self.link_account(&user.id, provider, profile).await?;
            tracing::info!(user_id = %user.id, provider = %provider, "Linked provider to existing user");
            return Ok(ResolvedUser {
                user,
                is_new_user: false,
            });
        }

        let user = self.create_federated_user(&email, profile).await?;
        self.link_account(&user.id, provider, profile).await?;
        tracing::info!(user_id = %user.id, provider = %provider, "Created user from provider login");

        Ok(ResolvedUser {
            user,
            is_new_user: true,
        })
    }

    /// Idempotent for a link the user already owns.
    pub async fn link_account(
        &self,
        user_id: &str,
        provider: OAuthProvider,
        profile: &NormalizedUser,
    ) -> Result<FederatedAccount, OAuthError> {
        if let Some(existing) = self
            .accounts
            .find_by_provider_account(provider.as_str(), &profile.id)
            .await?
        {
            if existing.user_id == user_id {
                return Ok(existing);
            }
            return Err(OAuthError::AccountAlreadyLinked);
        }

        let account = FederatedAccount {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            provider: provider.as_str().to_string(),
            provider_account_id: profile.id.clone(),
            provider_email: Some(normalize_email(&profile.email)),
            created_at: Utc::now(),
        };

        match self.accounts.create(&account).await {
            Ok(()) => Ok(account),
            Err(e) if e.is_conflict_on("provider") => Err(OAuthError::AccountAlreadyLinked),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn unlink_account(
        &self,
        user_id: &str,
        provider: OAuthProvider,
    ) -> Result<(), OAuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let links = self.accounts.list_for_user(user_id).await?;

        if !links.iter().any(|l| l.provider == provider.as_str()) {
            return Err(OAuthError::AccountNotLinked);
        }
        if user.password_hash.is_none() && links.len() <= 1 {
            return Err(OAuthError::CannotUnlinkLastLoginMethod);
        }

        self.accounts.delete_for_user(user_id, provider.as_str()).await?;
        tracing::info!(user_id = %user_id, provider = %provider, "Provider unlinked");
        Ok(())
    }

    pub async fn linked_accounts(&self, user_id: &str) -> Result<Vec<FederatedAccount>, OAuthError> {
        Ok(self.accounts.list_for_user(user_id).await?)
    }

    async fn create_federated_user(
        &self,
        email: &str,
        profile: &NormalizedUser,
    ) -> Result<User, OAuthError> {
        let base = derive_username(profile.username.as_deref(), email);
        let now = Utc::now();

        for attempt in 0..USERNAME_ATTEMPTS {
            let username = if attempt == 0 {
                base.clone()
            } else {
                with_suffix(&base, rand::random_range(1000..10000))
            };
            if self.users.find_by_username(&username).await?.is_some() {
                continue;
            }

            let user = User {
                id: Uuid::new_v4().to_string(),
                username,
                email: email.to_string(),
                name: profile.name.clone(),
                bio: None,
                image: profile.avatar_url.clone(),
                password_hash: None,
                role: Role::User,
                email_verified: Some(now),
                two_factor_enabled: false,
                created_at: now,
                updated_at: now,
            };

            match self.users.create(&user).await {
                Ok(()) => return Ok(user),
                Err(e) if e.is_conflict_on("username") => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::UsernameAlreadyExists.into())
    }
}

fn build_authorization_url(
    provider: OAuthProvider,
    config: &ProviderConfig,
    state: &str,
) -> Result<String, OAuthError> {
    let scope = config.scopes.join(" ");
    let mut params: Vec<(&str, &str)> = vec![
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", scope.as_str()),
        ("response_type", "code"),
        ("state", state),
    ];
    match provider {
        OAuthProvider::Google => {
            params.push(("access_type", "offline"));
            params.push(("prompt", "consent"));
        }
        OAuthProvider::Github => params.push(("allow_signup", "true")),
        OAuthProvider::Facebook => {}
    }

    reqwest::Url::parse_with_params(&config.auth_url, &params)
        .map(String::from)
        .map_err(|e| {
            AuthError::Internal(format!(
                "invalid authorization URL for {}: {}",
                provider, e
            ))
            .into()
        })
}

/// Provider login when it fits the username rules, else the e-mail local part.
pub fn derive_username(provider_username: Option<&str>, email: &str) -> String {
    let source = provider_username
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email));

    let mut username: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(30)
        .collect();
    while username.len() < 3 {
        username.push('_');
    }
    username
}

fn with_suffix(base: &str, suffix: u32) -> String {
    let suffix = suffix.to_string();
    let keep = 30usize.saturating_sub(suffix.len());
    format!("{}{}", &base[..base.len().min(keep)], suffix)
}
