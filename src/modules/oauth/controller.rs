use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::interface::OAuthError;
use super::schema::{
    AuthorizationUrlResponse, CallbackQuery, LinkAccountRequest, LinkedAccountResponse,
    LinkedAccountsResponse, MobileCallbackRequest, OAuthLoginResponse, StartOAuthRequest,
};
use super::service::{parse_provider, ResolvedUser};
use crate::config::oauth::OAuthProvider;
use crate::middleware::auth::AuthUser;
use crate::modules::auth::schema::{MessageResponse, TokenResponse};
use crate::modules::oauth::model::NormalizedUser;
use crate::AppState;

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Option<Json<StartOAuthRequest>>,
) -> Result<Json<AuthorizationUrlResponse>, OAuthError> {
    let provider = parse_provider(&provider)?;
    let Json(req) = body.unwrap_or_default();

    let redirect = state
        .oauth
        .get_authorization_url(provider, req.redirect_url)
        .await?;

    Ok(Json(AuthorizationUrlResponse {
        authorization_url: redirect.url,
        state: redirect.state,
    }))
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<OAuthLoginResponse>, OAuthError> {
    let provider = parse_provider(&provider)?;
    if let Some(error) = query.error {
        return Err(OAuthError::AuthorizationDenied(
            query.error_description.unwrap_or(error),
        ));
    }

    let outcome = state
        .oauth
        .handle_callback(provider, query.code.as_deref(), query.state.as_deref())
        .await?;

    let resolved = state.oauth.resolve_user(provider, &outcome.profile).await?;
    login_response(&state, resolved, Some(outcome.redirect_url)).await
}

pub async fn mobile_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(req): Json<MobileCallbackRequest>,
) -> Result<Json<OAuthLoginResponse>, OAuthError> {
    let provider = parse_provider(&provider)?;

    let profile = state
        .oauth
        .handle_mobile_callback(
            provider,
            &req.code,
            &req.code_verifier,
            req.redirect_uri.as_deref(),
        )
        .await?;

    let resolved = state.oauth.resolve_user(provider, &profile).await?;
    login_response(&state, resolved, None).await
}

pub async fn link(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(provider): Path<String>,
    Json(req): Json<LinkAccountRequest>,
) -> Result<Json<LinkedAccountResponse>, OAuthError> {
    let provider = parse_provider(&provider)?;
    let profile = provider_profile(&state, provider, &req).await?;

    let account = state
        .oauth
        .link_account(&user.user_id, provider, &profile)
        .await?;
    Ok(Json(account.into()))
}

pub async fn unlink(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(provider): Path<String>,
) -> Result<Json<MessageResponse>, OAuthError> {
    let provider = parse_provider(&provider)?;
    state.oauth.unlink_account(&user.user_id, provider).await?;
    Ok(Json(MessageResponse {
        message: "Account unlinked successfully",
    }))
}

pub async fn linked_accounts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<LinkedAccountsResponse>, OAuthError> {
    let accounts = state.oauth.linked_accounts(&user.user_id).await?;
    Ok(Json(LinkedAccountsResponse {
        accounts: accounts.into_iter().map(Into::into).collect(),
    }))
}

async fn provider_profile(
    state: &AppState,
    provider: OAuthProvider,
    req: &LinkAccountRequest,
) -> Result<NormalizedUser, OAuthError> {
    if let Some(verifier) = req.code_verifier.as_deref() {
        return state
            .oauth
            .handle_mobile_callback(provider, &req.code, verifier, req.redirect_uri.as_deref())
            .await;
    }

    let outcome = state
        .oauth
        .handle_callback(provider, Some(&req.code), req.state.as_deref())
        .await?;
    Ok(outcome.profile)
}

async fn login_response(
    state: &AppState,
    resolved: ResolvedUser,
    redirect_url: Option<String>,
) -> Result<Json<OAuthLoginResponse>, OAuthError> {
    let pair = state.auth.tokens().issue(&resolved.user).await?;
    tracing::info!(user_id = %resolved.user.id, new_user = resolved.is_new_user, "Federated login");
    state.metrics.record_auth_event("oauth_login", true);

    Ok(Json(OAuthLoginResponse {
        tokens: TokenResponse::new(pair, Some(&resolved.user)),
        is_new_user: resolved.is_new_user,
        redirect_url,
    }))
}
