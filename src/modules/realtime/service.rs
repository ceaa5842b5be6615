use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use super::events::{ClientFrame, RealtimeEvent};
use super::hub::{ConnectionHandle, Hub, HubError, OUTBOUND_BUFFER};
use crate::config::StoreError;
use crate::modules::messaging::interface::MessageStore;
use crate::modules::messaging::model::{conversation_channel, MessageView};
use crate::services::metrics::MetricsRegistry;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Conversation {0} not found")]
    ConversationNotFound(i64),
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Domain-level fan-out on top of the hub. Delivery is at-most-once; clients
/// re-fetch after reconnecting.
pub struct RealtimeService {
    hub: Arc<Hub>,
    store: Arc<dyn MessageStore>,
    metrics: Arc<MetricsRegistry>,
}

impl RealtimeService {
    pub fn new(hub: Arc<Hub>, store: Arc<dyn MessageStore>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { hub, store, metrics }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Owns the socket until either side closes it or the hub displaces it.
    pub async fn handle_connection(self: Arc<Self>, user_id: String, socket: WebSocket) {
        let (handle, mut outbound) = ConnectionHandle::new(OUTBOUND_BUFFER);
        let connection_id = handle.id();

        if let Err(e) = self.hub.connect(&user_id, handle.clone()).await {
            tracing::warn!(user_id = %user_id, error = %e, "Rejected realtime connection");
            return;
        }

        let (mut ws_sender, mut ws_receiver) = socket.split();

        let writer_handle = handle.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_handle.closed() => break,
                    payload = outbound.recv() => {
                        let Some(payload) = payload else { break };
                        if ws_sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = ws_sender.send(WsMessage::Close(None)).await;
        });

        loop {
            tokio::select! {
                _ = handle.closed() => break,
                frame = ws_receiver.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reply) = self.handle_client_frame(&user_id, text.as_str()).await {
                            match reply.to_json() {
                                Ok(json) => {
                                    if let Err(e) = handle.send(json) {
                                        tracing::debug!(user_id = %user_id, error = %e, "Failed to queue reply");
                                    }
                                }
                                Err(e) => tracing::error!(error = %e, "Failed to serialize reply"),
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, error = %e, "Realtime read failed");
                        break;
                    }
                },
            }
        }

        self.hub.disconnect(&user_id, connection_id).await;
        handle.close();
        let _ = writer.await;
    }

    /// Applies a client frame; returns an error event to send back, if any.
    pub async fn handle_client_frame(&self, user_id: &str, text: &str) -> Option<RealtimeEvent> {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(_) => return Some(RealtimeEvent::error(None, "Unrecognized frame")),
        };

        match frame {
            ClientFrame::Subscribe { conversation_id } => {
                if let Err(e) = self.subscribe_to_conversation(user_id, conversation_id).await {
                    tracing::warn!(user_id = %user_id, conversation_id, error = %e, "Subscribe failed");
                    return Some(RealtimeEvent::error(Some(conversation_id), "Subscribe failed"));
                }
            }
            ClientFrame::Unsubscribe { conversation_id } => {
                self.unsubscribe_from_conversation(user_id, conversation_id).await;
            }
            ClientFrame::Ping => {
                tracing::trace!(user_id = %user_id, "Realtime ping");
            }
        }
        None
    }

    /// Non-participants are refused silently (`Ok(false)`).
    pub async fn subscribe_to_conversation(
        &self,
        user_id: &str,
        conversation_id: i64,
    ) -> Result<bool, StoreError> {
        if !self.store.is_participant(conversation_id, user_id).await? {
            tracing::debug!(user_id = %user_id, conversation_id, "Refused subscription for non-participant");
            return Ok(false);
        }
        self.hub
            .subscribe(user_id, &conversation_channel(conversation_id))
            .await;
        Ok(true)
    }

    pub async fn unsubscribe_from_conversation(&self, user_id: &str, conversation_id: i64) -> bool {
        self.hub
            .unsubscribe(user_id, &conversation_channel(conversation_id))
            .await
    }

    pub async fn broadcast_new_message(
        &self,
        conversation_id: i64,
        message: &MessageView,
    ) -> Result<usize, BroadcastError> {
        self.broadcast(
            conversation_id,
            RealtimeEvent::new_message(conversation_id, message.clone()),
        )
        .await
    }

    pub async fn broadcast_message_edited(
        &self,
        conversation_id: i64,
        message: &MessageView,
    ) -> Result<usize, BroadcastError> {
        self.broadcast(
            conversation_id,
            RealtimeEvent::message_edited(conversation_id, message.clone()),
        )
        .await
    }

    pub async fn broadcast_message_deleted(
        &self,
        conversation_id: i64,
        message_id: i64,
    ) -> Result<usize, BroadcastError> {
        self.broadcast(
            conversation_id,
            RealtimeEvent::message_deleted(conversation_id, message_id),
        )
        .await
    }

    pub async fn broadcast_message_read(
        &self,
        conversation_id: i64,
        message_id: Option<i64>,
        read_by: &str,
    ) -> Result<usize, BroadcastError> {
        self.broadcast(
            conversation_id,
            RealtimeEvent::message_read(conversation_id, message_id, read_by),
        )
        .await
    }

    /// Sends `event` to each connected participant; returns how many received it.
    async fn broadcast(&self, conversation_id: i64, event: RealtimeEvent) -> Result<usize, BroadcastError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or(BroadcastError::ConversationNotFound(conversation_id))?;
        let payload = event.to_json()?;
        let event_type = event.event_type.as_str();

        let mut delivered = 0;
        for participant in conversation.participants() {
            match self.hub.send_message(participant, &payload).await {
                Ok(true) => {
                    delivered += 1;
                    self.metrics.record_realtime_event(event_type, "delivered");
                }
                Ok(false) => self.metrics.record_realtime_event(event_type, "offline"),
                Err(e) => {
                    self.metrics.record_realtime_event(event_type, "failed");
                    log_send_failure(participant, conversation_id, &e);
                }
            }
        }
        Ok(delivered)
    }
}

fn log_send_failure(user_id: &str, conversation_id: i64, error: &HubError) {
    tracing::warn!(user_id = %user_id, conversation_id, error = %error, "Realtime send failed");
}
