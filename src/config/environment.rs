use std::env;
use std::str::FromStr;

use super::oauth::{load_provider_registry, ProviderRegistry, RegistryKind};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} has an invalid value")]
    Invalid(&'static str),
}

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub db_min_connections: u32,
    pub db_max_connections: u32,
    /// Base URL used when building links for outgoing mail.
    pub app_url: String,
    pub rate_limit_enabled: bool,
    /// Whether a reverse proxy sets `X-Forwarded-For`; otherwise rate limits key on the peer.
    pub trust_proxy_headers: bool,
    pub web_providers: ProviderRegistry,
    pub mobile_providers: ProviderRegistry,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        // HMAC-SHA256 key must carry 256 bits.
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            access_token_ttl_secs: parse_or("ACCESS_TOKEN_TTL_SECS", 900)?,
            refresh_token_ttl_secs: parse_or("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?,
            port: parse_or("PORT", 8080)?,
            cors_origins,
            db_min_connections: parse_or("DB_MIN_CONNECTIONS", 5)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 30)?,
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            rate_limit_enabled: parse_or("RATE_LIMIT_ENABLED", true)?,
            trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", false)?,
            web_providers: load_provider_registry(RegistryKind::Web),
            mobile_providers: load_provider_registry(RegistryKind::Mobile),
        })
    }

    /// Configuration for tests and local tooling; no environment access.
    pub fn for_testing(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            port: 8080,
            cors_origins: Vec::new(),
            db_min_connections: 1,
            db_max_connections: 5,
            app_url: "http://localhost:3000".to_string(),
            rate_limit_enabled: false,
            trust_proxy_headers: false,
            web_providers: ProviderRegistry::default(),
            mobile_providers: ProviderRegistry::default(),
        }
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(name))
        }
        _ => Ok(default),
    }
}
