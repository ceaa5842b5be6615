use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::middleware::require_auth;
use crate::modules::oauth::controller as oauth;
use crate::AppState;

pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let limits = &state.rate_limits;

    let public = Router::new()
        .route(
            "/register",
            post(controller::register).layer(limits.layer(&limits.register)),
        )
        .route(
            "/login",
            post(controller::login).layer(limits.layer(&limits.login)),
        )
        .route(
            "/refresh-token",
            post(controller::refresh_token).layer(
                limits
                    .layer(&limits.refresh)
                    .keyed_by_user(state.jwt_service.clone()),
            ),
        )
        .route("/validate-token", post(controller::validate_token))
        .route(
            "/forgot-password",
            post(controller::forgot_password).layer(limits.layer(&limits.password_reset)),
        )
        .route(
            "/reset-password",
            post(controller::reset_password).layer(limits.layer(&limits.password_reset)),
        )
        .route(
            "/verify-email",
            post(controller::verify_email).layer(limits.layer(&limits.verification)),
        )
        .route(
            "/resend-verification",
            post(controller::resend_verification).layer(limits.layer(&limits.verification)),
        )
        .route("/oauth/{provider}", post(oauth::start))
        .route("/oauth/callback/{provider}", get(oauth::callback))
        .route("/oauth/mobile/{provider}", post(oauth::mobile_callback));

    let protected = Router::new()
        .route("/logout", post(controller::logout))
        .route("/change-password", post(controller::change_password))
        .route("/me", get(controller::me))
        .route("/link/{provider}", post(oauth::link))
        .route("/unlink/{provider}", delete(oauth::unlink))
        .route("/linked-accounts", get(oauth::linked_accounts))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected)
}
