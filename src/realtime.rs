// 📡 Realtime Hub
// Per-user broadcast channels feeding dashboard WebSockets

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::bot::DashboardUpdate;

/// Messages buffered per user before slow receivers start lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Fan-out of serialized `DashboardUpdate`s to every open connection of a user.
///
/// A channel is created on first subscribe and dropped by `prune` once its
/// last receiver is gone.
#[derive(Clone)]
pub struct UpdateHub {
    channels: Arc<RwLock<HashMap<i64, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl UpdateHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, user_id: i64) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        tracing::info!(user_id, "dashboard connected");
        sender.subscribe()
    }

    /// Returns how many connections received the update (0 when nobody listens)
    pub async fn publish(&self, user_id: i64, update: &DashboardUpdate) -> usize {
        let payload = match serde_json::to_string(update) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(user_id, error = %e, "failed to serialize dashboard update");
                return 0;
            }
        };

        let channels = self.channels.read().await;
        match channels.get(&user_id) {
            Some(sender) => sender.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn publish_all(&self, user_id: i64, updates: &[DashboardUpdate]) {
        for update in updates {
            self.publish(user_id, update).await;
        }
    }

    pub async fn subscriber_count(&self, user_id: i64) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&user_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels with no receivers; returns how many were removed
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }
}
