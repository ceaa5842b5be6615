use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::middleware::{require_admin, require_auth, require_coach_or_admin};
use crate::AppState;

pub fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let profiles = Router::new().route("/users/{id}", get(controller::get_user));

    let coach = Router::new()
        .route("/coach/clients", get(controller::list_clients))
        .route_layer(middleware::from_fn(require_coach_or_admin));

    let admin = Router::new()
        .route("/admin/users/{id}", get(controller::admin_get_user))
        .route("/admin/users/{id}/role", put(controller::admin_update_role))
        .route_layer(middleware::from_fn(require_admin));

    profiles
        .merge(coach)
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
