//! C10: picks the session to drive next, blocking on the `new-session`
//! pub/sub channel when neither an active nor an upcoming session exists.

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::Session;
use crate::error::PhaseError;
use crate::hotstore::HotStore;
use crate::relational::RelationalStore;

#[derive(Debug, Deserialize)]
struct NewSessionMessage {
    #[serde(rename = "sessionId")]
    session_id: i64,
}

pub struct SessionSelector {
    relational: RelationalStore,
    store: HotStore,
}

impl SessionSelector {
    #[must_use]
    pub fn new(relational: RelationalStore, store: HotStore) -> Self {
        Self { relational, store }
    }

    /// Prefers the currently active session; falls back to the next
    /// scheduled one; blocks on `new-session` if neither exists.
    pub async fn pick(&self) -> Result<Session, PhaseError> {
        if let Some(session) = self.relational.active_session().await? {
            return Ok(session);
        }
        if let Some(session) = self.relational.next_session().await? {
            return Ok(session);
        }

        info!("no active or upcoming session, waiting on new-session channel");
        let mut receiver = self.store.subscribe(HotStore::NEW_SESSION_CHANNEL).await?;
        loop {
            let Some(raw) = receiver.recv().await else {
                return Err(PhaseError::HotStore(crate::error::HotStoreError::Connection(
                    "new-session subscription closed".to_owned(),
                )));
            };
            let Ok(message) = serde_json::from_str::<NewSessionMessage>(&raw) else {
                warn!(payload = %raw, "malformed new-session payload, ignoring");
                continue;
            };
            match self
                .relational
                .session_by_id(crate::domain::SessionId(message.session_id))
                .await
            {
                Ok(session) => return Ok(session),
                Err(error) => {
                    warn!(session_id = message.session_id, %error, "failed to load announced session, still waiting");
                }
            }
        }
    }
}
