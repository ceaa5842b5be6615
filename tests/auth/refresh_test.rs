use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::TestContext;

#[tokio::test]
async fn refresh_token_is_single_use() {
    let ctx = TestContext::new().await;
    let alice = ctx.user("alice", "user").await;

    let first = ctx
        .server
        .post("/auth/refresh-token")
        .json(&json!({ "refresh_token": alice.refresh_token }))
        .await;
    first.assert_status(StatusCode::OK);
    let rotated = first.json::<Value>()["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(rotated, alice.refresh_token);

    let replay = ctx
        .server
        .post("/auth/refresh-token")
        .json(&json!({ "refresh_token": alice.refresh_token }))
        .await;
    replay.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(replay.json::<Value>()["code"], "InvalidRefreshToken");

    let next = ctx
        .server
        .post("/auth/refresh-token")
        .json(&json!({ "refresh_token": rotated }))
        .await;
    next.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn unknown_refresh_token_is_rejected() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/refresh-token")
        .json(&json!({ "refresh_token": "not-a-real-token" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "InvalidRefreshToken");
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let ctx = TestContext::new().await;
    let alice = ctx.user("alice", "user").await;
    ctx.db.expire_refresh_tokens(&alice.id);

    let response = ctx
        .server
        .post("/auth/refresh-token")
        .json(&json!({ "refresh_token": alice.refresh_token }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "RefreshTokenExpired");
}

#[tokio::test]
async fn refresh_secrets_are_stored_hashed() {
    let ctx = TestContext::new().await;
    let alice = ctx.user("alice", "user").await;

    let stored = ctx.db.refresh_tokens_for(&alice.id);
    assert!(!stored.is_empty());
    assert!(stored.iter().all(|t| t.token_hash != alice.refresh_token));
    assert!(stored.iter().all(|t| t.token_hash.len() == 64));
}
