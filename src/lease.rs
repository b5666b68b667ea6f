//! Optional leader-election lease (§9): wraps session monitoring in a
//! mutual-exclusion lease so a second worker instance does not double-drive
//! the same session. Off by default; the design assumes singleton
//! deployment and treats this as a hook for operators who need more.

use clap::Parser;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::error::HotStoreError;
use crate::hotstore::HotStore;

#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[group(skip)]
pub struct Options {
    /// Require a Redis lease before driving a session, for multi-instance
    /// deployments. Off by default (single-active-worker assumed).
    #[clap(long, env, default_value = "false")]
    pub enable_leader_election: bool,

    /// Lease time-to-live, in milliseconds.
    #[clap(long, env, default_value = "15000")]
    pub lease_ttl_ms: u64,
}

pub struct Lease {
    store: HotStore,
    key: String,
    holder: String,
    ttl: Duration,
}

impl Lease {
    #[must_use]
    pub fn new(store: HotStore, session_id: crate::domain::SessionId, ttl: Duration) -> Self {
        Self {
            store,
            key: format!("worker:active:{session_id}"),
            holder: Uuid::new_v4().to_string(),
            ttl,
        }
    }

    /// Attempts to acquire the lease with `SET key value NX PX ttl`. Returns
    /// `true` if this instance now holds it.
    pub async fn try_acquire(&self) -> Result<bool, HotStoreError> {
        let mut conn = self.store.raw_connection();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.holder)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        Ok(acquired.is_some())
    }

    /// Extends the lease's TTL; only has effect if this instance is still
    /// the recorded holder.
    pub async fn renew(&self) -> Result<(), HotStoreError> {
        let mut conn = self.store.raw_connection();
        let held_by: Option<String> = conn
            .get(&self.key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        if held_by.as_deref() == Some(self.holder.as_str()) {
            let _: () = conn
                .pexpire(&self.key, self.ttl.as_millis() as usize)
                .await
                .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn release(&self) -> Result<(), HotStoreError> {
        let mut conn = self.store.raw_connection();
        let held_by: Option<String> = conn
            .get(&self.key)
            .await
            .map_err(|e| HotStoreError::Connection(e.to_string()))?;
        if held_by.as_deref() == Some(self.holder.as_str()) {
            self.store.del(&self.key).await?;
        }
        Ok(())
    }
}
