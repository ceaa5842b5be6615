use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use std::sync::Arc;
use validator::Validate;

use crate::middleware::auth::{bearer_token, AuthUser};
use crate::modules::auth::{
    interface::AuthError,
    schema::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
        RefreshTokenRequest, RegisterRequest, RegisterResponse, ResendVerificationRequest,
        ResetPasswordRequest, TokenResponse, UserResponse, ValidateTokenRequest,
        ValidateTokenResponse, VerifyEmailRequest,
    },
    service::RegisterInput,
};
use crate::AppState;

const NON_ENUMERATING_RESET: &str =
    "If an account exists for that email, a password reset link has been sent";
const NON_ENUMERATING_VERIFY: &str =
    "If an account exists for that email, a verification link has been sent";

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    req.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let user = state
        .auth
        .register(RegisterInput {
            username: req.username,
            email: req.email,
            password: req.password,
            name: req.name,
            role: req.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(&user),
            message: "Registration successful, please verify your email",
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let result = state.auth.login(&req.identifier, &req.password).await;
    state.metrics.record_auth_event("login", result.is_ok());

    let (user, pair) = result?;
    Ok(Json(TokenResponse::new(pair, Some(&user))))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let result = state.auth.rotate_tokens(&req.refresh_token).await;
    state.metrics.record_auth_event("refresh", result.is_ok());

    let (_, pair) = result?;
    Ok(Json(TokenResponse::new(pair, None)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.logout(&user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully",
    }))
}

/// Token introspection. Reads `token` from the body, falling back to the bearer header.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<ValidateTokenRequest>>,
) -> Json<ValidateTokenResponse> {
    let token = body
        .and_then(|Json(b)| b.token)
        .or_else(|| bearer_token(&headers).map(str::to_string))
        .unwrap_or_default();

    let response = match state.auth.validate_access_token(&token) {
        Ok(claims) => ValidateTokenResponse {
            valid: true,
            user_id: Some(claims.user_id),
            email: Some(claims.email),
            role: Some(claims.role),
            expires_at: Some(claims.exp),
            error: None,
        },
        Err(e) => ValidateTokenResponse {
            valid: false,
            user_id: None,
            email: None,
            role: None,
            expires_at: None,
            error: Some(e.code().to_string()),
        },
    };

    Json(response)
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse {
        message: NON_ENUMERATING_RESET,
    }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.reset_password(&req.token, &req.password).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .auth
        .change_password(&user.user_id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let (user, pair) = state.auth.verify_email(&req.token).await?;
    Ok(Json(TokenResponse::new(pair, Some(&user))))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.resend_email_verification(&req.email).await?;
    Ok(Json(MessageResponse {
        message: NON_ENUMERATING_VERIFY,
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.auth.get_user(&user.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}
