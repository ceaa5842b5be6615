use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::middleware::require_auth;
use crate::AppState;

pub fn messaging_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversations",
            post(controller::create_conversation).get(controller::list_conversations),
        )
        .route("/conversations/{id}", get(controller::get_conversation))
        .route(
            "/conversations/{id}/unread-count",
            get(controller::unread_count),
        )
        .route(
            "/conversations/{id}/messages",
            get(controller::list_messages),
        )
        .route(
            "/conversations/{id}/read-all",
            post(controller::mark_all_read),
        )
        .route(
            "/conversations/{id}/archive",
            put(controller::archive_conversation),
        )
        .route(
            "/conversations/{id}/subscribe",
            post(controller::subscribe),
        )
        .route(
            "/conversations/{id}/unsubscribe",
            post(controller::unsubscribe),
        )
        .route("/messages", post(controller::send_message))
        .route(
            "/messages/{id}",
            put(controller::edit_message).delete(controller::delete_message),
        )
        .route("/messages/{id}/read", post(controller::mark_read))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
