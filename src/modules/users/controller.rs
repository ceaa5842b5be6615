use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::schema::{ClientsResponse, UpdateRoleRequest};
use crate::middleware::auth::{ensure_owner_or_coach, AuthUser};
use crate::modules::auth::interface::AuthError;
use crate::modules::auth::schema::UserResponse;
use crate::AppState;

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    ensure_owner_or_coach(&state, &caller, &user_id).await?;

    // Unknown ids surface as 403 above unless the caller is admin or the owner.
    let user = state.users.get_user(&user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> Result<Json<ClientsResponse>, AuthError> {
    let clients: Vec<UserResponse> = state
        .users
        .list_clients(&caller.user_id)
        .await?
        .iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(ClientsResponse {
        total: clients.len(),
        clients,
    }))
}

pub async fn admin_get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.users.get_user(&user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn admin_update_role(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state
        .users
        .update_role(&admin.user_id, &user_id, req.role)
        .await?;
    Ok(Json(UserResponse::from(&user)))
}
