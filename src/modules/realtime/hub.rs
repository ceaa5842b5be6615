//! In-process registry of live connections and their channel subscriptions.
//!
//! Map edits take the write lock; sends and snapshots take the read lock.
//! Connects and disconnects arrive through two bounded mailboxes drained by a
//! single dispatcher task, so connection owners never contend on the lock directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::services::metrics::MetricsRegistry;

pub const MAILBOX_CAPACITY: usize = 256;
pub const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Realtime hub is shutting down")]
    ShuttingDown,
    #[error("Connection is closed")]
    ConnectionClosed,
    #[error("Connection send buffer is full")]
    BufferFull,
}

/// Write side of one client connection. Payloads are queued in call order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    outbound: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(buffer);
        (
            Self {
                id: Uuid::new_v4(),
                outbound,
                closed: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn send(&self, payload: String) -> Result<(), HubError> {
        if self.closed.is_cancelled() {
            return Err(HubError::ConnectionClosed);
        }
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => HubError::BufferFull,
            TrySendError::Closed(_) => HubError::ConnectionClosed,
        })
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the hub (or a displacing connection) closes this handle.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

struct Registration {
    user_id: String,
    handle: ConnectionHandle,
    ack: oneshot::Sender<()>,
}

struct Unregistration {
    user_id: String,
    connection_id: Uuid,
    ack: oneshot::Sender<()>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<String, ConnectionHandle>,
    subscriptions: HashMap<String, HashSet<String>>,
}

pub struct Hub {
    state: RwLock<HubState>,
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<Unregistration>,
    shutdown: CancellationToken,
    metrics: Arc<MetricsRegistry>,
}

impl Hub {
    /// Spawns the dispatcher; it stops when `shutdown` is cancelled.
    pub fn start(shutdown: CancellationToken, metrics: Arc<MetricsRegistry>) -> Arc<Self> {
        let (register_tx, register_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(MAILBOX_CAPACITY);

        let hub = Arc::new(Self {
            state: RwLock::new(HubState::default()),
            register_tx,
            unregister_tx,
            shutdown,
            metrics,
        });

        tokio::spawn(hub.clone().dispatch(register_rx, unregister_rx));
        hub
    }

    async fn dispatch(
        self: Arc<Self>,
        mut register_rx: mpsc::Receiver<Registration>,
        mut unregister_rx: mpsc::Receiver<Unregistration>,
    ) {
        tracing::info!("Realtime hub started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(reg) = register_rx.recv() => {
                    self.apply_connect(reg.user_id, reg.handle).await;
                    let _ = reg.ack.send(());
                }
                Some(unreg) = unregister_rx.recv() => {
                    self.apply_disconnect(&unreg.user_id, unreg.connection_id).await;
                    let _ = unreg.ack.send(());
                }
                else => break,
            }
        }

        self.close_all().await;
        tracing::info!("Realtime hub stopped");
    }

    /// Registers `handle` for `user_id`, closing any connection it displaces.
    pub async fn connect(&self, user_id: &str, handle: ConnectionHandle) -> Result<(), HubError> {
        if self.shutdown.is_cancelled() {
            handle.close();
            return Err(HubError::ShuttingDown);
        }

        let (ack, done) = oneshot::channel();
        self.register_tx
            .send(Registration {
                user_id: user_id.to_string(),
                handle,
                ack,
            })
            .await
            .map_err(|_| HubError::ShuttingDown)?;
        done.await.map_err(|_| HubError::ShuttingDown)
    }

    /// Removes the user's entry if it still belongs to `connection_id`.
    pub async fn disconnect(&self, user_id: &str, connection_id: Uuid) {
        let (ack, done) = oneshot::channel();
        let queued = self
            .unregister_tx
            .send(Unregistration {
                user_id: user_id.to_string(),
                connection_id,
                ack,
            })
            .await;
        if queued.is_ok() {
            let _ = done.await;
        }
    }

    async fn apply_connect(&self, user_id: String, handle: ConnectionHandle) {
        let mut state = self.state.write().await;

        if let Some(previous) = state.connections.insert(user_id.clone(), handle) {
            previous.close();
            tracing::debug!(user_id = %user_id, "Displaced previous realtime connection");
        }
        state.subscriptions.insert(user_id.clone(), HashSet::new());

        self.metrics.set_realtime_connections(state.connections.len());
        tracing::info!(user_id = %user_id, active = state.connections.len(), "Realtime client connected");
    }

    async fn apply_disconnect(&self, user_id: &str, connection_id: Uuid) {
        let mut state = self.state.write().await;

        let owns_entry = state
            .connections
            .get(user_id)
            .is_some_and(|h| h.id() == connection_id);
        if !owns_entry {
            return;
        }

        if let Some(handle) = state.connections.remove(user_id) {
            handle.close();
        }
        state.subscriptions.remove(user_id);

        self.metrics.set_realtime_connections(state.connections.len());
        tracing::info!(user_id = %user_id, active = state.connections.len(), "Realtime client disconnected");
    }

    async fn close_all(&self) {
        let mut state = self.state.write().await;
        for handle in state.connections.values() {
            handle.close();
        }
        let closed = state.connections.len();
        state.connections.clear();
        state.subscriptions.clear();

        self.metrics.set_realtime_connections(0);
        tracing::info!(closed, "Closed all realtime connections");
    }

    /// Returns `true` if the channel was newly added. Users without a live
    /// connection have no subscription set.
    pub async fn subscribe(&self, user_id: &str, channel: &str) -> bool {
        let mut state = self.state.write().await;
        state
            .subscriptions
            .get_mut(user_id)
            .is_some_and(|set| set.insert(channel.to_string()))
    }

    pub async fn unsubscribe(&self, user_id: &str, channel: &str) -> bool {
        let mut state = self.state.write().await;
        state
            .subscriptions
            .get_mut(user_id)
            .is_some_and(|set| set.remove(channel))
    }

    pub async fn is_subscribed(&self, user_id: &str, channel: &str) -> bool {
        let state = self.state.read().await;
        state
            .subscriptions
            .get(user_id)
            .is_some_and(|set| set.contains(channel))
    }

    /// `Ok(false)` when the user has no live connection; the payload is dropped.
    pub async fn send_message(&self, user_id: &str, payload: &str) -> Result<bool, HubError> {
        let state = self.state.read().await;
        match state.connections.get(user_id) {
            Some(handle) => handle.send(payload.to_string()).map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.state.read().await.connections.contains_key(user_id)
    }

    pub async fn active_connections(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn connected_users(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut users: Vec<String> = state.connections.keys().cloned().collect();
        users.sort();
        users
    }

    pub async fn subscriptions_for(&self, user_id: &str) -> Vec<String> {
        let state = self.state.read().await;
        let mut channels: Vec<String> = state
            .subscriptions
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
