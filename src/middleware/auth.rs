//! Request-scoped authorization: bearer validation, identity attachment and role guards.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::modules::auth::interface::AuthError;
use crate::modules::auth::model::Role;
use crate::services::jwt::Claims;
use crate::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

/// Identity of the caller, attached to request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
    pub claims: Claims,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id.clone(),
            role: claims.role,
            claims,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Real-time endpoint lookup order: `token` query parameter, then the bearer header,
/// then the `auth_token` cookie.
pub fn resolve_realtime_token(
    query_token: Option<&str>,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Option<String> {
    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| bearer_token(headers).map(str::to_string))
        .or_else(|| {
            jar.get(AUTH_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

/// Middleware that requires a valid bearer access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::Unauthorized)?;
    let claims = state.auth.validate_access_token(token)?;

    request.extensions_mut().insert(AuthUser::from_claims(claims));
    Ok(next.run(request).await)
}

/// Runs after `require_auth`; rejects callers whose role is neither coach nor admin.
pub async fn require_coach_or_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, Role::is_coach_or_admin)?;
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, |role| *role == Role::Admin)?;
    Ok(next.run(request).await)
}

fn require_role(request: &Request, allowed: impl Fn(&Role) -> bool) -> Result<(), AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::Unauthorized)?;

    if allowed(&user.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.user_id, role = %user.role, "Role check failed");
        Err(AuthError::InsufficientPermissions)
    }
}

/// Cross-user access: the owner, an admin, or the coach assigned to `target_user_id`.
pub async fn ensure_owner_or_coach(
    state: &AppState,
    caller: &AuthUser,
    target_user_id: &str,
) -> Result<(), AuthError> {
    if caller.user_id == target_user_id || caller.is_admin() {
        return Ok(());
    }

    if caller.role == Role::Coach
        && state
            .assignments
            .is_coach_of(&caller.user_id, target_user_id)
            .await?
    {
        return Ok(());
    }

    Err(AuthError::InsufficientPermissions)
}
