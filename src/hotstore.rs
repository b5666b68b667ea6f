//! C4: the shared key/value + pub/sub store holding hot per-lobby state.
//!
//! Exposes the primitives from the spec's key schema table as typed
//! methods instead of bare Redis commands, so callers (the lobby manager,
//! the distributor, the phase handlers) never construct a key string by
//! hand outside of this module.

use clap::Parser;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::{LobbyId, SessionId};
use crate::error::HotStoreError;

#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[group(skip)]
pub struct Options {
    /// Redis connection string for the hot store / pub-sub bus.
    #[clap(long, env, default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,
}

#[derive(Clone)]
pub struct HotStore {
    conn: ConnectionManager,
    client: redis::Client,
}

impl HotStore {
    pub async fn connect(options: &Options) -> Result<Self, HotStoreError> {
        let client = redis::Client::open(options.redis_url.as_str())
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        Ok(Self { conn, client })
    }

    // ---- key schema (authoritative, mirrors the spec's table) ----

    #[must_use]
    pub fn lobby_key(session: SessionId, lobby: LobbyId) -> String {
        format!("lobby:session:{session}:lobby:{lobby}")
    }

    #[must_use]
    pub fn lobbies_index_key(session: SessionId) -> String {
        format!("lobby:session:{session}:lobbies")
    }

    #[must_use]
    pub fn session_players_key(session: SessionId) -> String {
        format!("session:{session}:players")
    }

    #[must_use]
    pub fn player_status_key(lobby: LobbyId, wallet: &str) -> String {
        format!("lobby:{lobby}:player:{wallet}")
    }

    #[must_use]
    pub fn forum_messages_key(lobby: LobbyId) -> String {
        format!("forum:lobby:{lobby}:messages")
    }

    #[must_use]
    pub fn votes_key(session: SessionId, lobby: LobbyId, round: u32) -> String {
        format!("voting:session:{session}:lobby:{lobby}:round:{round}")
    }

    #[must_use]
    pub fn topic_key(session: SessionId, round: u32, lobby: LobbyId) -> String {
        format!("topic:session:{session}:round:{round}:lobby:{lobby}")
    }

    #[must_use]
    pub fn elimination_key(lobby: LobbyId) -> String {
        format!("elimination:lobby:{lobby}")
    }

    pub const NEW_SESSION_CHANNEL: &'static str = "new-session";
    pub const SESSIONS_CHANNEL: &'static str = "sessions";
    pub const ROUNDS_CHANNEL: &'static str = "rounds";

    #[must_use]
    pub fn lobby_channel(lobby: LobbyId) -> String {
        format!("lobby-{lobby}")
    }

    /// Escape hatch for callers needing commands this module doesn't wrap
    /// (e.g. the leader-election lease's `SET ... NX PX`).
    #[must_use]
    pub fn raw_connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    // ---- primitives ----

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, HotStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| HotStoreError::MalformedPayload { key: key.to_owned() }),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(value)
            .map_err(|_| HotStoreError::MalformedPayload { key: key.to_owned() })?;
        conn.set(key, raw)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn del(&self, key: &str) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn exists(&self, key: &str) -> Result<bool, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn list_push(&self, key: &str, value: &str) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        conn.rpush(key, value)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn list_range(&self, key: &str) -> Result<Vec<String>, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, -1)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn set_add(&self, key: &str, member: &str) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        conn.sadd(key, member)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn set_members(&self, key: &str) -> Result<Vec<String>, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn set_is_member(&self, key: &str, member: &str) -> Result<bool, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn set_cardinality(&self, key: &str) -> Result<u64, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.scard(key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        conn.hset(key, field, value)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, HotStoreError> {
        let mut conn = self.conn.clone();
        conn.hget(key, field)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    /// Scoped deletion of every key touched by a session, preferred over a
    /// bald `flush_all` unless the deployment is known single-tenant.
    /// `total_rounds` is needed to reconstruct the per-round vote-tally and
    /// topic-cache keys, which carry no index of their own.
    pub async fn purge_session(
        &self,
        session: SessionId,
        total_rounds: u32,
    ) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        let lobbies_index = Self::lobbies_index_key(session);
        let lobby_keys: Vec<String> = conn
            .smembers(&lobbies_index)
            .await
            .unwrap_or_default();

        let mut keys_to_delete = lobby_keys.clone();
        keys_to_delete.push(lobbies_index);
        keys_to_delete.push(Self::session_players_key(session));

        for lobby_key in &lobby_keys {
            let Some(lobby_id) = lobby_key.rsplit(':').next().and_then(|s| s.parse().ok()) else {
                continue;
            };
            let lobby_id = LobbyId(lobby_id);
            keys_to_delete.push(Self::elimination_key(lobby_id));
            keys_to_delete.push(Self::forum_messages_key(lobby_id));

            if let Ok(Some(lobby)) = self.get_json::<crate::domain::Lobby>(lobby_key).await {
                for player in &lobby.players {
                    keys_to_delete.push(Self::player_status_key(lobby_id, &player.wallet_address));
                }
            }

            for round in 1..=total_rounds {
                keys_to_delete.push(Self::votes_key(session, lobby_id, round));
                keys_to_delete.push(Self::topic_key(session, round, lobby_id));
            }
        }

        if !keys_to_delete.is_empty() {
            let _: () = conn
                .del(keys_to_delete)
                .await
                .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn flush_all(&self) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    pub async fn publish(&self, channel: &str, message: &str) -> Result<(), HotStoreError> {
        let mut conn = self.conn.clone();
        conn.publish(channel, message)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))
    }

    /// Subscribes to `channel` and forwards every message as a `String` on
    /// the returned receiver. Runs on a dedicated task so the caller never
    /// blocks the dispatcher; closing the receiver stops the task.
    pub async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, HotStoreError> {
        let (tx, rx) = mpsc::channel(16);
        let mut pubsub = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?
            .into_pubsub();
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            use futures::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "failed to decode pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
