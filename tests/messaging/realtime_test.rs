use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{drain_frames, frames_of_type, TestContext};

#[tokio::test]
async fn new_message_reaches_participants_only() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let outsider = ctx.user("outsider", "user").await;
    let id = ctx.conversation(&coach, &client).await;

    let mut coach_rx = ctx.connect(&coach.id).await;
    let mut client_rx = ctx.connect(&client.id).await;
    let mut outsider_rx = ctx.connect(&outsider.id).await;

    for user in [&coach, &client] {
        let response = ctx
            .server
            .post(&format!("/conversations/{}/subscribe", id))
            .authorization_bearer(&user.access_token)
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["subscribed"], true);
    }

    ctx.send(&coach, id, "hi").await;

    let frames = drain_frames(&mut client_rx);
    let new_messages = frames_of_type(&frames, "new_message");
    assert_eq!(new_messages.len(), 1);
    assert_eq!(new_messages[0]["conversation_id"], id);
    assert_eq!(new_messages[0]["message"]["sender_id"], coach.id.as_str());
    assert_eq!(new_messages[0]["message"]["message_text"], "hi");

    assert_eq!(frames_of_type(&drain_frames(&mut coach_rx), "new_message").len(), 1);
    assert!(drain_frames(&mut outsider_rx).is_empty());
}

#[tokio::test]
async fn edit_and_delete_are_broadcast() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;
    let mut client_rx = ctx.connect(&client.id).await;

    let message = ctx.send(&coach, id, "hi").await;
    let path = format!("/messages/{}", message["id"]);

    let edited = ctx
        .server
        .put(&path)
        .authorization_bearer(&coach.access_token)
        .json(&json!({ "message_text": "hi!" }))
        .await;
    edited.assert_status(StatusCode::OK);
    let edited: Value = edited.json();
    assert_eq!(edited["message_text"], "hi!");
    assert!(edited["edited_at"].is_string());

    ctx.server
        .delete(&path)
        .authorization_bearer(&coach.access_token)
        .await
        .assert_status(StatusCode::OK);

    let listing = ctx
        .server
        .get(&format!("/conversations/{}/messages", id))
        .authorization_bearer(&client.access_token)
        .await
        .json::<Value>();
    assert!(listing["messages"].as_array().unwrap().is_empty());

    let frames = drain_frames(&mut client_rx);
    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["new_message", "message_edited", "message_deleted"]);
    assert_eq!(frames[1]["message"]["message_text"], "hi!");
    assert_eq!(frames[2]["message_id"], message["id"]);
}

#[tokio::test]
async fn read_receipts_are_broadcast_once() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;
    let message = ctx.send(&coach, id, "hi").await;
    let mut coach_rx = ctx.connect(&coach.id).await;
    let read_path = format!("/messages/{}/read", message["id"]);

    for _ in 0..2 {
        ctx.server
            .post(&read_path)
            .authorization_bearer(&client.access_token)
            .await
            .assert_status(StatusCode::OK);
    }

    let frames = drain_frames(&mut coach_rx);
    let reads = frames_of_type(&frames, "message_read");
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0]["read_by"], client.id.as_str());
    assert_eq!(reads[0]["message_id"], message["id"]);

    // Nothing left unread: no aggregate event.
    ctx.server
        .post(&format!("/conversations/{}/read-all", id))
        .authorization_bearer(&client.access_token)
        .await
        .assert_status(StatusCode::OK);
    assert!(drain_frames(&mut coach_rx).is_empty());
}

#[tokio::test]
async fn subscribe_without_connection_reports_false() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;

    let response = ctx
        .server
        .post(&format!("/conversations/{}/subscribe", id))
        .authorization_bearer(&coach.access_token)
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["subscribed"], false);
}

#[tokio::test]
async fn subscribe_does_not_reveal_foreign_or_missing_conversations() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let outsider = ctx.user("outsider", "user").await;
    let id = ctx.conversation(&coach, &client).await;
    let _rx = ctx.connect(&outsider.id).await;

    for conversation_id in [id, id + 999] {
        for action in ["subscribe", "unsubscribe"] {
            let response = ctx
                .server
                .post(&format!("/conversations/{}/{}", conversation_id, action))
                .authorization_bearer(&outsider.access_token)
                .await;
            response.assert_status(StatusCode::OK);
            let body = response.json::<Value>();
            assert_eq!(body["subscribed"], false);
            assert_eq!(body["conversation_id"], conversation_id);
        }
    }
    assert!(ctx.state.hub.subscriptions_for(&outsider.id).await.is_empty());
}

#[tokio::test]
async fn listing_auto_subscribes_connected_user() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;
    let _rx = ctx.connect(&coach.id).await;

    ctx.server
        .get("/conversations")
        .authorization_bearer(&coach.access_token)
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(
        ctx.state.hub.subscriptions_for(&coach.id).await,
        vec![format!("conversation:{}", id)]
    );

    ctx.server
        .post(&format!("/conversations/{}/unsubscribe", id))
        .authorization_bearer(&coach.access_token)
        .await
        .assert_status(StatusCode::OK);
    assert!(ctx.state.hub.subscriptions_for(&coach.id).await.is_empty());
}

#[tokio::test]
async fn reconnect_displaces_previous_connection() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let id = ctx.conversation(&coach, &client).await;

    let mut old_rx = ctx.connect(&client.id).await;
    let mut new_rx = ctx.connect(&client.id).await;
    assert_eq!(ctx.state.hub.active_connections().await, 1);

    ctx.send(&coach, id, "after reconnect").await;

    assert!(drain_frames(&mut old_rx).is_empty());
    assert_eq!(frames_of_type(&drain_frames(&mut new_rx), "new_message").len(), 1);
}

#[tokio::test]
async fn health_reports_active_connections() {
    let ctx = TestContext::new().await;
    let _rx = ctx.connect("someone").await;

    let body = ctx.server.get("/health").await.json::<Value>();
    assert_eq!(body["realtime_connections"], 1);
}

#[tokio::test]
async fn client_frames_manage_subscriptions() {
    let ctx = TestContext::new().await;
    let coach = ctx.user("coach1", "coach").await;
    let client = ctx.user("client1", "client").await;
    let outsider = ctx.user("outsider", "user").await;
    let id = ctx.conversation(&coach, &client).await;
    let _coach_rx = ctx.connect(&coach.id).await;
    let _outsider_rx = ctx.connect(&outsider.id).await;
    let realtime = &ctx.state.realtime;
    let channel = format!("conversation:{}", id);

    let subscribe = json!({ "type": "subscribe", "conversation_id": id }).to_string();
    assert!(realtime.handle_client_frame(&coach.id, &subscribe).await.is_none());
    assert!(ctx.state.hub.is_subscribed(&coach.id, &channel).await);

    // Non-participants are refused without an error frame.
    assert!(realtime.handle_client_frame(&outsider.id, &subscribe).await.is_none());
    assert!(!ctx.state.hub.is_subscribed(&outsider.id, &channel).await);

    let unsubscribe = json!({ "type": "unsubscribe", "conversation_id": id }).to_string();
    assert!(realtime.handle_client_frame(&coach.id, &unsubscribe).await.is_none());
    assert!(!ctx.state.hub.is_subscribed(&coach.id, &channel).await);

    assert!(realtime.handle_client_frame(&coach.id, r#"{"type":"ping"}"#).await.is_none());

    let error = realtime
        .handle_client_frame(&coach.id, "not json")
        .await
        .expect("error event");
    let error: Value = serde_json::from_str(&error.to_json().unwrap()).unwrap();
    assert_eq!(error["type"], "error");
}
