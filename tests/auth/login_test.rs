use axum::http::StatusCode;
use serde_json::{json, Value};

use leornian_core::services::jwt::JwtService;

use crate::common::{test_password, TestContext, TEST_JWT_SECRET};

#[tokio::test]
async fn login_by_email_returns_tokens_with_claims() {
    let ctx = TestContext::new().await;
    let registered = ctx.register("alice", "user").await;
    let user_id = registered["user"]["id"].as_str().unwrap();

    let response = ctx
        .server
        .post("/auth/login")
        .json(&json!({
            "identifier": "alice@example.com",
            "password": test_password()
        }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());

    let claims = JwtService::new(TEST_JWT_SECRET.to_string())
        .verify_access_token(body["access_token"].as_str().unwrap())
        .expect("access token verifies");
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.role.as_str(), "user");
}

#[tokio::test]
async fn login_by_username_succeeds() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;

    let response = ctx
        .server
        .post("/auth/login")
        .json(&json!({ "identifier": "alice", "password": test_password() }))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["user"]["username"], "alice");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;

    let unknown = ctx
        .server
        .post("/auth/login")
        .json(&json!({ "identifier": "ghost@example.com", "password": "x" }))
        .await;
    let wrong = ctx
        .server
        .post("/auth/login")
        .json(&json!({ "identifier": "alice@example.com", "password": "wrong" }))
        .await;

    unknown.assert_status(StatusCode::UNAUTHORIZED);
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.text(), r#"{"error":"Invalid email or password"}"#);
    assert_eq!(unknown.text(), wrong.text());
}

#[tokio::test]
async fn login_records_auth_metrics() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;
    ctx.login("alice", test_password()).await;

    let metrics = ctx.server.get("/metrics").await;
    metrics.assert_status(StatusCode::OK);
    let text = metrics.text();
    assert!(text.contains("leornian_auth_events_total"));
    assert!(text.contains(r#"event="login""#));
}
