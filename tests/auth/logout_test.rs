use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{test_password, TestContext};

#[tokio::test]
async fn logout_revokes_every_refresh_token() {
    let ctx = TestContext::new().await;
    ctx.register("alice", "user").await;

    let first = ctx.login("alice", test_password()).await;
    let second = ctx.login("alice@example.com", test_password()).await;
    let access = second["access_token"].as_str().unwrap();

    ctx.server
        .post("/auth/logout")
        .authorization_bearer(access)
        .await
        .assert_status(StatusCode::OK);

    for body in [&first, &second] {
        let response = ctx
            .server
            .post("/auth/refresh-token")
            .json(&json!({ "refresh_token": body["refresh_token"] }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["code"], "RefreshTokenExpired");
    }
}

#[tokio::test]
async fn logout_requires_authentication() {
    let ctx = TestContext::new().await;

    let response = ctx.server.post("/auth/logout").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "Unauthorized");
}
