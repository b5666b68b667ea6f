//! C3: fire-and-forget fan-out of named events on named channels.
//!
//! Delivery is at-least-once and unordered across channels; within a
//! channel, publish order from a single worker instance is preserved
//! because `HotStore::publish` awaits the underlying `PUBLISH` call before
//! returning and phase handlers never issue two broadcasts concurrently on
//! the same channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::hotstore::HotStore;

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, channel: &str, event_name: &str, payload: serde_json::Value);
}

pub struct RedisBroadcaster {
    store: HotStore,
}

impl RedisBroadcaster {
    #[must_use]
    pub fn new(store: HotStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, event_name: &str, payload: serde_json::Value) {
        let envelope = serde_json::json!({ "event": event_name, "payload": payload });
        let message = envelope.to_string();
        if let Err(error) = self.store.publish(channel, &message).await {
            warn!(%channel, %event_name, %error, "broadcast publish failed");
        }
    }
}

/// Convenience extension so call sites can pass a serializable struct
/// instead of hand-building a `serde_json::Value`.
#[async_trait]
pub trait BroadcasterExt: Broadcaster {
    async fn publish_event(&self, channel: &str, event_name: &str, payload: impl Serialize + Send) {
        let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        self.publish(channel, event_name, value).await;
    }
}

impl<T: Broadcaster + ?Sized> BroadcasterExt for T {}
