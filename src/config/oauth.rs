use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identity providers the service knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Facebook,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [Self::Google, Self::Github, Self::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Facebook => "facebook",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Self::Google => "GOOGLE",
            Self::Github => "GITHUB",
            Self::Facebook => "FACEBOOK",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "facebook" => Ok(Self::Facebook),
            other => Err(format!("unsupported provider: {}", other)),
        }
    }
}

/// Endpoint and client settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub token_url: String,
    pub user_info_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub supports_pkce: bool,
}

impl ProviderConfig {
    /// Well-known endpoints for `provider`; client settings left empty.
    pub fn defaults_for(provider: OAuthProvider) -> Self {
        let (auth_url, token_url, user_info_url, scopes): (&str, &str, &str, &[&str]) =
            match provider {
                OAuthProvider::Google => (
                    "https://accounts.google.com/o/oauth2/v2/auth",
                    "https://oauth2.googleapis.com/token",
                    "https://www.googleapis.com/oauth2/v3/userinfo",
                    &["openid", "email", "profile"],
                ),
                OAuthProvider::Github => (
                    "https://github.com/login/oauth/authorize",
                    "https://github.com/login/oauth/access_token",
                    "https://api.github.com/user",
                    &["read:user", "user:email"],
                ),
                OAuthProvider::Facebook => (
                    "https://www.facebook.com/v18.0/dialog/oauth",
                    "https://graph.facebook.com/v18.0/oauth/access_token",
                    "https://graph.facebook.com/me?fields=id,name,email,picture.type(large)",
                    &["email", "public_profile"],
                ),
            };

        Self {
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            user_info_url: user_info_url.to_string(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: String::new(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            supports_pkce: provider != OAuthProvider::Facebook,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<OAuthProvider, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn with_provider(mut self, provider: OAuthProvider, config: ProviderConfig) -> Self {
        self.providers.insert(provider, config);
        self
    }

    pub fn get(&self, provider: OAuthProvider) -> Option<&ProviderConfig> {
        self.providers.get(&provider)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RegistryKind {
    Web,
    Mobile,
}

/// Builds a registry from `{PROVIDER}_CLIENT_ID` style variables (`{PROVIDER}_MOBILE_...` for
/// the mobile registry). Providers without a client id are left out.
pub fn load_provider_registry(kind: RegistryKind) -> ProviderRegistry {
    let mut registry = ProviderRegistry::default();

    for provider in OAuthProvider::ALL {
        let prefix = match kind {
            RegistryKind::Web => provider.env_prefix().to_string(),
            RegistryKind::Mobile => format!("{}_MOBILE", provider.env_prefix()),
        };

        let Ok(client_id) = std::env::var(format!("{}_CLIENT_ID", prefix)) else {
            continue;
        };
        if client_id.trim().is_empty() {
            continue;
        }

        let mut config = ProviderConfig::defaults_for(provider);
        config.client_id = client_id.trim().to_string();
        config.client_secret = std::env::var(format!("{}_CLIENT_SECRET", prefix))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        config.redirect_uri = std::env::var(format!("{}_REDIRECT_URI", prefix)).unwrap_or_default();

        registry = registry.with_provider(provider, config);
    }

    registry
}
