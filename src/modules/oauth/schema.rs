use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::FederatedAccount;
use crate::modules::auth::schema::TokenResponse;

#[derive(Debug, Deserialize, Default)]
pub struct StartOAuthRequest {
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MobileCallbackRequest {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: Option<String>,
}

/// Either the web `state` or the mobile `code_verifier` must accompany the code.
#[derive(Debug, Deserialize)]
pub struct LinkAccountRequest {
    pub code: String,
    pub state: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OAuthLoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub is_new_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkedAccountResponse {
    pub provider: String,
    pub provider_account_id: String,
    pub provider_email: Option<String>,
    pub linked_at: DateTime<Utc>,
}

impl From<FederatedAccount> for LinkedAccountResponse {
    fn from(account: FederatedAccount) -> Self {
        Self {
            provider: account.provider,
            provider_account_id: account.provider_account_id,
            provider_email: account.provider_email,
            linked_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkedAccountsResponse {
    pub accounts: Vec<LinkedAccountResponse>,
}
