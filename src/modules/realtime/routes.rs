use axum::{routing::get, Router};
use std::sync::Arc;

use super::controller;
use crate::AppState;

pub fn realtime_routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(controller::connect))
}
