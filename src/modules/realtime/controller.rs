use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::middleware::auth::resolve_realtime_token;
use crate::modules::auth::interface::AuthError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Authenticates before upgrading; the socket is then owned by the realtime service.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    jar: CookieJar,
    ws: WebSocketUpgrade,
) -> Result<Response, AuthError> {
    let token = resolve_realtime_token(query.token.as_deref(), &headers, &jar)
        .ok_or(AuthError::Unauthorized)?;
    let claims = state.auth.validate_access_token(&token)?;

    let realtime = state.realtime.clone();
    let user_id = claims.user_id;
    Ok(ws.on_upgrade(move |socket| realtime.handle_connection(user_id, socket)))
}
