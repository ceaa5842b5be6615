use axum::http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use super::provider::{ProviderFixture, PROVIDER_TOKEN};
use leornian_core::config::oauth::OAuthProvider;

#[tokio::test]
async fn mobile_login_forwards_code_verifier() {
    let fixture = ProviderFixture::start().await;
    Mock::given(method("POST"))
        .and(path("/github/token"))
        .and(body_string_contains("code_verifier=verifier123"))
        .and(body_string_contains("redirect_uri=com.leornian.app%3A%2F%2Foauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": PROVIDER_TOKEN
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    fixture
        .serve_profile(
            OAuthProvider::Github,
            json!({
                "id": 583231,
                "login": "octocat",
                "name": "The Octocat",
                "email": "octocat@example.com",
                "avatar_url": "https://avatars.example.com/u/583231"
            }),
        )
        .await;

    let response = fixture
        .ctx
        .server
        .post("/auth/oauth/mobile/github")
        .json(&json!({
            "code": "mobilecode",
            "code_verifier": "verifier123",
            "redirect_uri": "com.leornian.app://oauth"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["is_new_user"], true);
    assert_eq!(body["user"]["username"], "octocat");
    assert_eq!(body["user"]["image"], "https://avatars.example.com/u/583231");
    assert!(body.get("redirect_url").is_none());
}

#[tokio::test]
async fn github_falls_back_to_verified_email_list() {
    let fixture = ProviderFixture::start().await;
    fixture.accept_code(OAuthProvider::Github, "code1").await;
    fixture
        .serve_profile(
            OAuthProvider::Github,
            json!({ "id": 42, "login": "hidden-mail", "email": null }),
        )
        .await;
    Mock::given(method("GET"))
        .and(path("/github/userinfo/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "email": "unverified@example.com", "primary": true, "verified": false },
            { "email": "verified@example.com", "primary": false, "verified": true }
        ])))
        .mount(&fixture.server)
        .await;

    let response = fixture
        .ctx
        .server
        .post("/auth/oauth/mobile/github")
        .json(&json!({ "code": "code1", "code_verifier": "v" }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["user"]["email"], "verified@example.com");
}

#[tokio::test]
async fn mobile_login_requires_verifier() {
    let fixture = ProviderFixture::start().await;

    let response = fixture
        .ctx
        .server
        .post("/auth/oauth/mobile/google")
        .json(&json!({ "code": "code1", "code_verifier": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "MissingParameter");
}
