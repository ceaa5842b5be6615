use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::TestContext;

#[tokio::test]
async fn create_conversation_is_idempotent_per_pair() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;

    let id = ctx.conversation(&coach, &client).await;

    let again = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&client.access_token)
        .json(&json!({ "coach_id": coach.id, "client_id": client.id }))
        .await;
    again.assert_status(StatusCode::OK);
    assert_eq!(again.json::<Value>()["id"], id);
}

#[tokio::test]
async fn outsiders_cannot_create_or_read_conversations() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let outsider = ctx.user("outsider", "user").await;

    let create = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&outsider.access_token)
        .json(&json!({ "coach_id": coach.id, "client_id": client.id }))
        .await;
    create.assert_status(StatusCode::FORBIDDEN);

    let id = ctx.conversation(&coach, &client).await;
    let read = ctx
        .server
        .get(&format!("/conversations/{}", id))
        .authorization_bearer(&outsider.access_token)
        .await;
    read.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(read.json::<Value>()["code"], "NotParticipant");
}

#[tokio::test]
async fn admin_may_open_conversation_for_others() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin("admin1").await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;

    let response = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&admin.access_token)
        .json(&json!({ "coach_id": coach.id, "client_id": client.id }))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn self_conversation_is_rejected() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;

    let response = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&coach.access_token)
        .json(&json!({ "coach_id": coach.id, "client_id": coach.id }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn coach_side_must_hold_coach_role() {
    let ctx = TestContext::new().await;
    let member = ctx.user("member", "user").await;
    let client = ctx.user("client1", "client").await;

    let response = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&member.access_token)
        .json(&json!({ "coach_id": member.id, "client_id": client.id }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "InvalidParticipants");
}

#[tokio::test]
async fn unknown_participants_are_not_found() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let admin = ctx.admin("admin1").await;

    let response = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&coach.access_token)
        .json(&json!({ "coach_id": coach.id, "client_id": "no-such-user" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "ParticipantNotFound");

    let response = ctx
        .server
        .post("/conversations")
        .authorization_bearer(&admin.access_token)
        .json(&json!({ "coach_id": "no-such-coach", "client_id": coach.id }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "ParticipantNotFound");
}

#[tokio::test]
async fn missing_conversation_is_not_found() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;

    let response = ctx
        .server
        .get("/conversations/9999")
        .authorization_bearer(&coach.access_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "ConversationNotFound");
}

#[tokio::test]
async fn listing_shows_latest_message_and_hides_archived() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let first_client = ctx.user("client1", "client").await;
    let second_client = ctx.user("client2", "client").await;

    let first = ctx.conversation(&coach, &first_client).await;
    let second = ctx.conversation(&coach, &second_client).await;
    ctx.send(&first_client, first, "hello coach").await;

    let listing = ctx
        .server
        .get("/conversations")
        .authorization_bearer(&coach.access_token)
        .await;
    listing.assert_status(StatusCode::OK);
    let body: Value = listing.json();
    assert_eq!(body["total"], 2);
    let rows = body["conversations"].as_array().unwrap();
    let row = rows.iter().find(|r| r["id"] == first).unwrap();
    assert_eq!(row["last_message_text"], "hello coach");
    assert_eq!(row["message_count"], 1);

    ctx.server
        .put(&format!("/conversations/{}/archive", second))
        .authorization_bearer(&coach.access_token)
        .json(&json!({ "archived": true }))
        .await
        .assert_status(StatusCode::OK);

    let active = ctx
        .server
        .get("/conversations")
        .authorization_bearer(&coach.access_token)
        .await
        .json::<Value>();
    assert_eq!(active["total"], 1);

    let everything = ctx
        .server
        .get("/conversations")
        .add_query_param("include_archived", true)
        .authorization_bearer(&coach.access_token)
        .await
        .json::<Value>();
    assert_eq!(everything["total"], 2);
}

#[tokio::test]
async fn unread_count_and_read_all() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;

    ctx.send(&coach, id, "one").await;
    ctx.send(&coach, id, "two").await;
    ctx.send(&client, id, "mine").await;

    let unread = ctx
        .server
        .get(&format!("/conversations/{}/unread-count", id))
        .authorization_bearer(&client.access_token)
        .await
        .json::<Value>();
    assert_eq!(unread["unread_count"], 2);

    let marked = ctx
        .server
        .post(&format!("/conversations/{}/read-all", id))
        .authorization_bearer(&client.access_token)
        .await;
    marked.assert_status(StatusCode::OK);
    assert_eq!(marked.json::<Value>()["marked"], 2);

    let unread = ctx
        .server
        .get(&format!("/conversations/{}/unread-count", id))
        .authorization_bearer(&client.access_token)
        .await
        .json::<Value>();
    assert_eq!(unread["unread_count"], 0);
}

#[tokio::test]
async fn conversation_routes_require_authentication() {
    let ctx = TestContext::new().await;

    ctx.server
        .get("/conversations")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
