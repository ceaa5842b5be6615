use axum::http::StatusCode;
use serde_json::{json, Value};

use super::provider::ProviderFixture;

#[tokio::test]
async fn link_list_and_unlink() {
    let fixture = ProviderFixture::start().await;
    let alice = fixture.ctx.user("alice", "user").await;
    fixture.google_user("code1", "g-55", "alice.work@example.com").await;

    let linked = fixture
        .ctx
        .server
        .post("/auth/link/google")
        .authorization_bearer(&alice.access_token)
        .json(&json!({ "code": "code1", "code_verifier": "verifier" }))
        .await;
    linked.assert_status_ok();
    let linked: Value = linked.json();
    assert_eq!(linked["provider"], "google");
    assert_eq!(linked["provider_email"], "alice.work@example.com");

    let accounts: Value = fixture
        .ctx
        .server
        .get("/auth/linked-accounts")
        .authorization_bearer(&alice.access_token)
        .await
        .json();
    assert_eq!(accounts["accounts"].as_array().unwrap().len(), 1);

    // Password login remains, so the only link can go.
    let unlinked = fixture
        .ctx
        .server
        .delete("/auth/unlink/google")
        .authorization_bearer(&alice.access_token)
        .await;
    unlinked.assert_status_ok();
    assert_eq!(unlinked.json::<Value>()["message"], "Account unlinked successfully");

    let again = fixture
        .ctx
        .server
        .delete("/auth/unlink/google")
        .authorization_bearer(&alice.access_token)
        .await;
    again.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(again.json::<Value>()["code"], "AccountNotLinked");
}

#[tokio::test]
async fn link_through_web_state() {
    let fixture = ProviderFixture::start().await;
    let alice = fixture.ctx.user("alice", "user").await;
    fixture.google_user("code1", "g-55", "alice@example.com").await;
    let state = fixture
        .start_state(leornian_core::config::oauth::OAuthProvider::Google)
        .await;

    fixture
        .ctx
        .server
        .post("/auth/link/google")
        .authorization_bearer(&alice.access_token)
        .json(&json!({ "code": "code1", "state": state }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn provider_identity_belongs_to_one_user() {
    let fixture = ProviderFixture::start().await;
    let alice = fixture.ctx.user("alice", "user").await;
    let bob = fixture.ctx.user("bob", "user").await;
    fixture.google_user("code1", "g-55", "shared@example.com").await;
    let body = json!({ "code": "code1", "code_verifier": "verifier" });

    fixture
        .ctx
        .server
        .post("/auth/link/google")
        .authorization_bearer(&alice.access_token)
        .json(&body)
        .await
        .assert_status_ok();

    // Relinking by the owner is accepted.
    fixture
        .ctx
        .server
        .post("/auth/link/google")
        .authorization_bearer(&alice.access_token)
        .json(&body)
        .await
        .assert_status_ok();

    let conflict = fixture
        .ctx
        .server
        .post("/auth/link/google")
        .authorization_bearer(&bob.access_token)
        .json(&body)
        .await;
    conflict.assert_status(StatusCode::CONFLICT);
    assert_eq!(conflict.json::<Value>()["code"], "AccountAlreadyLinked");
}

#[tokio::test]
async fn last_login_method_cannot_be_unlinked() {
    let fixture = ProviderFixture::start().await;
    fixture.google_user("code1", "g-9", "federated@example.com").await;
    let login: Value = fixture.web_login("code1").await.json();
    let token = login["access_token"].as_str().unwrap();

    let response = fixture
        .ctx
        .server
        .delete("/auth/unlink/google")
        .authorization_bearer(token)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "CannotUnlinkLastLoginMethod");
}

#[tokio::test]
async fn linking_requires_authentication() {
    let fixture = ProviderFixture::start().await;

    fixture
        .ctx
        .server
        .post("/auth/link/google")
        .json(&json!({ "code": "code1", "code_verifier": "verifier" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
