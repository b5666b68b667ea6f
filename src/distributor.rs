//! C7: shuffle + partition registered players into lobbies of bounded size.

use rand::seq::SliceRandom;
use tracing::warn;

use crate::domain::{LobbyId, LobbyPlayer, PlayerStatus, SessionId};
use crate::error::LobbyManagerError;
use crate::hotstore::HotStore;
use crate::lobby_manager::LobbyManager;
use crate::relational::RelationalStore;

pub struct PlayerDistributor {
    lobby_manager: LobbyManager,
    store: HotStore,
    relational: RelationalStore,
}

impl PlayerDistributor {
    #[must_use]
    pub fn new(lobby_manager: LobbyManager, store: HotStore, relational: RelationalStore) -> Self {
        Self {
            lobby_manager,
            store,
            relational,
        }
    }

    /// Returns the `(lobby_id, players)` pairs that were written.
    pub async fn distribute(
        &self,
        session_id: SessionId,
        max_players_per_lobby: u32,
    ) -> Result<Vec<(LobbyId, Vec<LobbyPlayer>)>, LobbyManagerError> {
        let mut wallets = self.cached_or_loaded_players(session_id).await?;
        if wallets.is_empty() {
            warn!(%session_id, "no registered players, skipping lobby creation");
            return Ok(Vec::new());
        }

        wallets.shuffle(&mut rand::thread_rng());

        let sizes = partition_sizes(wallets.len(), max_players_per_lobby);
        let mut assignments = Vec::with_capacity(sizes.len());
        let mut cursor = 0;
        for (lobby_index, size) in sizes.into_iter().enumerate() {
            let slice = &wallets[cursor..cursor + size];
            cursor += size;

            let lobby_id = LobbyId(u32::try_from(lobby_index + 1).unwrap_or(u32::MAX));
            let players: Vec<LobbyPlayer> = slice
                .iter()
                .map(|wallet| LobbyPlayer {
                    wallet_address: wallet.clone(),
                    status: PlayerStatus::Active,
                })
                .collect();

            self.lobby_manager
                .create_lobby(session_id, lobby_id, players.clone())
                .await?;

            assignments.push((lobby_id, players));
        }

        Ok(assignments)
    }

    async fn cached_or_loaded_players(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<String>, LobbyManagerError> {
        let cache_key = HotStore::session_players_key(session_id);
        let cached = self.store.set_members(&cache_key).await?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let players = self.relational.players_for_session(session_id).await?;

        let mut wallets = Vec::with_capacity(players.len());
        for player in players {
            self.store.set_add(&cache_key, &player.wallet_address).await?;
            wallets.push(player.wallet_address);
        }
        Ok(wallets)
    }
}

/// Lobby sizes for `total` players capped at `max` per lobby: `N = max(1,
/// floor(total/max))` lobbies, base size `floor(total/N)`, remainder
/// appended to the last lobby.
fn partition_sizes(total: usize, max: u32) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let max = max.max(1) as usize;
    let num_lobbies = (total / max).max(1);
    let base_size = total / num_lobbies;
    let remainder = total - base_size * num_lobbies;

    let mut sizes = vec![base_size; num_lobbies];
    if let Some(last) = sizes.last_mut() {
        *last += remainder;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_under_max() {
        assert_eq!(partition_sizes(3, 10), vec![3]);
    }

    #[test]
    fn exact_multiple_of_max() {
        assert_eq!(partition_sizes(20, 10), vec![10, 10]);
    }

    #[test]
    fn remainder_goes_to_last_lobby() {
        assert_eq!(partition_sizes(23, 10), vec![11, 12]);
    }

    #[test]
    fn empty_roster_produces_no_lobbies() {
        assert_eq!(partition_sizes(0, 10), Vec::<usize>::new());
    }

    #[test]
    fn total_players_preserved_across_lobbies() {
        let sizes = partition_sizes(97, 9);
        assert_eq!(sizes.iter().sum::<usize>(), 97);
    }
}
