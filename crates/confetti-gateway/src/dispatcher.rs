use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::warn;
use uuid::Uuid;

use confetti_types::events::GatewayEvent;

/// A feed event serialized once, tagged with the wedding event it belongs to
/// so each connection can filter without parsing.
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub event_id: Uuid,
    pub json: Arc<str>,
}

/// Fans feed events out to every connected client and routes targeted
/// events to a single principal.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every feed message and keeps the ones for
    /// its subscribed event.
    broadcast_tx: broadcast::Sender<FeedMessage>,

    /// principal id -> (conn_id -> sender). A guest can be connected from
    /// more than one device.
    connections: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event-scoped event to that event's subscribers.
    pub fn publish(&self, event: GatewayEvent) {
        let Some(event_id) = event.event_id() else {
            warn!("Refusing to broadcast connection-level event {:?}", event);
            return;
        };
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        // No receivers just means nobody is watching.
        let _ = self.inner.broadcast_tx.send(FeedMessage {
            event_id,
            json: json.into(),
        });
    }

    /// Register a connection for targeted events. Returns (conn_id, receiver).
    pub async fn register(&self, principal_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .entry(principal_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    pub async fn unregister(&self, principal_id: Uuid, conn_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        if let Some(conns) = connections.get_mut(&principal_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                connections.remove(&principal_id);
            }
        }
    }

    /// Send a targeted event to every connection of one principal.
    pub async fn send_to(&self, principal_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(conns) = connections.get(&principal_id) {
            for tx in conns.values() {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .await
            .values()
            .map(HashMap::len)
            .sum()
    }
}
