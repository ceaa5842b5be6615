use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{test_password, TestContext};

#[tokio::test]
async fn register_returns_created_user_without_secrets() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "Alice@Example.com",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["email_verified"], false);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_with_taken_email_conflicts() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "UserAlreadyExists");
}

#[tokio::test]
async fn register_with_taken_username_conflicts() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "UsernameAlreadyExists");
}

#[tokio::test]
async fn register_rejects_short_password() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "short"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "PasswordTooWeak");
}

#[tokio::test]
async fn register_rejects_admin_role() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "mallory",
            "email": "mallory@example.com",
            "password": test_password(),
            "role": "admin"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(ctx.db.user_by_email("mallory@example.com").is_none());
}

#[tokio::test]
async fn register_accepts_coach_role() {
    let ctx = TestContext::new().await;

    let body = ctx.register("coachy", "coach").await;
    assert_eq!(body["user"]["role"], "coach");
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/register")
        .json(&json!({
            "username": "carol",
            "email": "not-an-email",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
