use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::oauth::{OAuthProvider, ProviderConfig};
use crate::modules::oauth::model::NormalizedUser;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "leornian-auth-service";

/// HTTP client for identity provider token and profile endpoints.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Provider error: {0}")]
    Api(String),
    #[error("Provider did not return an email address")]
    MissingEmail,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

impl ProviderClient {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    /// Trades an authorization code for a provider access token.
    pub async fn exchange_code(
        &self,
        config: &ProviderConfig,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", config.client_id.as_str()),
        ];
        if let Some(secret) = config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self
            .client
            .post(&config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "token endpoint returned status: {}",
                response.status()
            )));
        }

        let body: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        // GitHub reports failures with a 200 and an `error` field.
        if let Some(error) = body.error {
            return Err(ProviderError::Api(
                body.error_description.unwrap_or(error),
            ));
        }

        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Parse("missing access_token".to_string()))
    }

    pub async fn fetch_user(
        &self,
        provider: OAuthProvider,
        config: &ProviderConfig,
        access_token: &str,
    ) -> Result<NormalizedUser, ProviderError> {
        let profile = self.get_json(&config.user_info_url, access_token).await?;

        match provider {
            OAuthProvider::Google => normalize_google(&profile),
            OAuthProvider::Facebook => normalize_facebook(&profile),
            OAuthProvider::Github => {
                let emails = if string_field(&profile, "email").is_none() {
                    let url = format!("{}/emails", config.user_info_url.trim_end_matches('/'));
                    let list = self.get_json(&url, access_token).await?;
                    serde_json::from_value::<Vec<GithubEmail>>(list)
                        .map_err(|e| ProviderError::Parse(e.to_string()))?
                } else {
                    Vec::new()
                };
                normalize_github(&profile, &emails)
            }
        }
    }

    async fn get_json(&self, url: &str, access_token: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "{} returned status: {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_id(value: &Value, keys: &[&str]) -> Result<String, ProviderError> {
    keys.iter()
        .find_map(|k| string_field(value, k))
        .ok_or_else(|| ProviderError::Parse("profile has no id".to_string()))
}

fn fallback_name(name: Option<String>, email: &str) -> String {
    name.unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string())
}

fn normalize_google(profile: &Value) -> Result<NormalizedUser, ProviderError> {
    let id = required_id(profile, &["sub", "id"])?;
    let email = string_field(profile, "email").ok_or(ProviderError::MissingEmail)?;
    let email_verified = match profile.get("email_verified") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };

    Ok(NormalizedUser {
        id,
        name: fallback_name(string_field(profile, "name"), &email),
        email,
        username: None,
        avatar_url: string_field(profile, "picture"),
        email_verified,
    })
}

fn normalize_github(profile: &Value, emails: &[GithubEmail]) -> Result<NormalizedUser, ProviderError> {
    let id = required_id(profile, &["id"])?;

    let email = match string_field(profile, "email") {
        Some(email) => email,
        None => emails
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| emails.iter().find(|e| e.verified))
            .map(|e| e.email.clone())
            .ok_or(ProviderError::MissingEmail)?,
    };
    let login = string_field(profile, "login");

    Ok(NormalizedUser {
        id,
        name: fallback_name(string_field(profile, "name").or_else(|| login.clone()), &email),
        email,
        username: login,
        avatar_url: string_field(profile, "avatar_url"),
        email_verified: true,
    })
}

fn normalize_facebook(profile: &Value) -> Result<NormalizedUser, ProviderError> {
    let id = required_id(profile, &["id"])?;
    let email = string_field(profile, "email").ok_or(ProviderError::MissingEmail)?;
    let avatar_url = profile
        .pointer("/picture/data/url")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(NormalizedUser {
        id,
        name: fallback_name(string_field(profile, "name"), &email),
        email,
        username: None,
        avatar_url,
        email_verified: true,
    })
}
