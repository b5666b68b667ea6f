//! C6: CRUD over lobby records, backed by the hot store, plus vote-tally
//! derivation.

use chrono::Utc;
use tracing::warn;

use crate::domain::{
    Lobby, LobbyId, LobbyPlayer, LobbyStatus, PlayerStatus, SessionId, VoteTally,
};
use crate::error::LobbyManagerError;
use crate::hotstore::HotStore;

#[derive(Clone)]
pub struct LobbyManager {
    store: HotStore,
}

impl LobbyManager {
    #[must_use]
    pub fn new(store: HotStore) -> Self {
        Self { store }
    }

    /// Idempotent: if the lobby key already exists, leaves it untouched.
    pub async fn create_lobby(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
        players: Vec<LobbyPlayer>,
    ) -> Result<(), LobbyManagerError> {
        let key = HotStore::lobby_key(session, lobby_id);
        if self.store.exists(&key).await? {
            tracing::info!(%session, %lobby_id, "lobby already exists, skipping create");
            return Ok(());
        }

        let lobby = Lobby {
            lobby_id,
            session_id: session,
            players,
            created_at: Utc::now(),
            status: LobbyStatus::Active,
        };
        self.store.set_json(&key, &lobby).await?;
        self.store
            .set_add(&HotStore::lobbies_index_key(session), &key)
            .await?;

        for player in &lobby.players {
            let player_key = HotStore::player_status_key(lobby_id, &player.wallet_address);
            self.store
                .set_json(&player_key, &PlayerStatusRecord { status: player.status })
                .await?;
        }
        Ok(())
    }

    pub async fn get_lobby(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
    ) -> Result<Option<Lobby>, LobbyManagerError> {
        let key = HotStore::lobby_key(session, lobby_id);
        Ok(self.store.get_json(&key).await?)
    }

    pub async fn get_all_lobbies(&self, session: SessionId) -> Result<Vec<Lobby>, LobbyManagerError> {
        let index_key = HotStore::lobbies_index_key(session);
        let lobby_keys = self.store.set_members(&index_key).await?;

        let mut lobbies = Vec::with_capacity(lobby_keys.len());
        for key in lobby_keys {
            match self.store.get_json::<Lobby>(&key).await {
                Ok(Some(lobby)) => lobbies.push(lobby),
                Ok(None) => warn!(%key, "lobby index referenced a missing lobby, skipping"),
                Err(error) => warn!(%key, %error, "corrupt lobby entry, skipping"),
            }
        }
        Ok(lobbies)
    }

    pub async fn get_active_lobbies(
        &self,
        session: SessionId,
    ) -> Result<Vec<Lobby>, LobbyManagerError> {
        Ok(self
            .get_all_lobbies(session)
            .await?
            .into_iter()
            .filter(|l| l.status == LobbyStatus::Active)
            .collect())
    }

    pub async fn update_lobby(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
        lobby: &Lobby,
    ) -> Result<(), LobbyManagerError> {
        let key = HotStore::lobby_key(session, lobby_id);
        self.store.set_json(&key, lobby).await?;
        Ok(())
    }

    pub async fn update_lobby_status(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
        status: LobbyStatus,
    ) -> Result<(), LobbyManagerError> {
        let mut lobby = self
            .get_lobby(session, lobby_id)
            .await?
            .ok_or(LobbyManagerError::LobbyNotFound(lobby_id.0))?;
        lobby.status = status;
        self.update_lobby(session, lobby_id, &lobby).await
    }

    pub async fn get_voting_results(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
        round: u32,
    ) -> Result<VoteTally, LobbyManagerError> {
        let key = HotStore::votes_key(session, lobby_id, round);
        let raw_choices = self.store.list_range(&key).await?;

        let mut tally = VoteTally::default();
        for choice in raw_choices {
            match choice.as_str() {
                "continue" => tally.continue_count += 1,
                "share" => tally.share_count += 1,
                other => warn!(%other, "unrecognized vote choice token, ignoring"),
            }
        }
        Ok(tally)
    }

    pub async fn clear_votes(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
        round: u32,
    ) -> Result<(), LobbyManagerError> {
        let key = HotStore::votes_key(session, lobby_id, round);
        self.store.del(&key).await?;
        Ok(())
    }

    /// Lobby players whose status is not ELIMINATED; empty if the lobby is
    /// not ACTIVE.
    pub async fn get_remaining_players(
        &self,
        session: SessionId,
        lobby_id: LobbyId,
    ) -> Result<Vec<LobbyPlayer>, LobbyManagerError> {
        let lobby = self.get_lobby(session, lobby_id).await?;
        Ok(lobby
            .map(|l| l.remaining_players().into_iter().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn set_player_status(
        &self,
        lobby_id: LobbyId,
        wallet: &str,
        status: PlayerStatus,
    ) -> Result<(), LobbyManagerError> {
        let key = HotStore::player_status_key(lobby_id, wallet);
        self.store
            .set_json(&key, &PlayerStatusRecord { status })
            .await?;
        Ok(())
    }

    pub async fn append_eliminations(
        &self,
        lobby_id: LobbyId,
        newly_eliminated: &[crate::domain::EliminatedPlayer],
    ) -> Result<(), LobbyManagerError> {
        let key = HotStore::elimination_key(lobby_id);
        let mut record: EliminationRecord = self
            .store
            .get_json(&key)
            .await?
            .unwrap_or_default();
        record
            .eliminated_players
            .extend(newly_eliminated.iter().cloned());
        self.store.set_json(&key, &record).await?;
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PlayerStatusRecord {
    status: PlayerStatus,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct EliminationRecord {
    eliminated_players: Vec<crate::domain::EliminatedPlayer>,
}
