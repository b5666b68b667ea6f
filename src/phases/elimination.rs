use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::broadcaster::BroadcasterExt;
use crate::domain::{LobbyStatus, PlayerStatus, RoundInRoute, Session};
use crate::error::PhaseError;
use crate::hotstore::HotStore;

use super::PhaseContext;

/// Calls the decision oracle for every active lobby concurrently, bounded
/// by `max_concurrent_ai_calls`. A lobby whose call fails is logged and
/// left untouched; the rest still proceed (per-lobby isolation, §4.9).
pub async fn elimination_start(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    let lobbies = ctx.lobby_manager.get_active_lobbies(session.id).await?;
    let semaphore = Arc::new(Semaphore::new(ctx.max_concurrent_ai_calls.max(1)));
    let agent_id = PhaseContext::agent_id(session);

    let mut handles = Vec::with_capacity(lobbies.len());
    for lobby in lobbies {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        let agent_id = agent_id.clone();
        let session_id = session.id;
        let total_rounds = session.total_rounds;
        let sequence_number = round.sequence_number;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            let lobby_id = lobby.lobby_id;

            let decision = match ctx
                .ai_client
                .decide_eliminations(&agent_id, session_id, lobby_id, total_rounds, sequence_number)
                .await
            {
                Ok(decision) if decision.success => decision,
                Ok(_) => {
                    warn!(%session_id, %lobby_id, "ai declined to decide eliminations, leaving lobby unchanged");
                    return;
                }
                Err(error) => {
                    warn!(%session_id, %lobby_id, %error, "decide_eliminations failed, leaving lobby unchanged");
                    return;
                }
            };

            if decision.eliminated.is_empty() {
                return;
            }

            for eliminated in &decision.eliminated {
                if let Err(error) = ctx
                    .lobby_manager
                    .set_player_status(lobby_id, &eliminated.participant, PlayerStatus::Eliminated)
                    .await
                {
                    warn!(%lobby_id, %error, "failed to record eliminated player status");
                }
            }

            let mut updated = lobby;
            for eliminated in &decision.eliminated {
                for player in &mut updated.players {
                    if player.wallet_address == eliminated.participant {
                        player.status = PlayerStatus::Eliminated;
                    }
                }
            }
            if let Err(error) = ctx
                .lobby_manager
                .update_lobby(session_id, lobby_id, &updated)
                .await
            {
                warn!(%lobby_id, %error, "failed to write back lobby after elimination");
                return;
            }
            if let Err(error) = ctx
                .lobby_manager
                .append_eliminations(lobby_id, &decision.eliminated)
                .await
            {
                warn!(%lobby_id, %error, "failed to append elimination record");
            }

            ctx.broadcaster
                .publish_event(
                    &HotStore::lobby_channel(lobby_id),
                    "elimination-start",
                    serde_json::json!({ "eliminatedPlayers": decision.eliminated }),
                )
                .await;
        }));
    }

    for handle in handles {
        if let Err(error) = handle.await {
            warn!(%error, "elimination task panicked");
        }
    }
    Ok(())
}

pub async fn elimination_end(
    ctx: &PhaseContext,
    session: &Session,
    _round: &RoundInRoute,
) -> Result<(), PhaseError> {
    for lobby in ctx.lobby_manager.get_active_lobbies(session.id).await? {
        let lobby_id = lobby.lobby_id;
        let remaining_count = ctx
            .lobby_manager
            .get_remaining_players(session.id, lobby_id)
            .await?
            .len();

        ctx.broadcaster
            .publish_event(
                &HotStore::lobby_channel(lobby_id),
                "elimination-end",
                serde_json::json!({
                    "lobbyId": lobby_id.0,
                    "message": "Elimination round complete.",
                    "remainingParticipants": remaining_count,
                }),
            )
            .await;

        if remaining_count <= 1 {
            ctx.lobby_manager
                .update_lobby_status(session.id, lobby_id, LobbyStatus::Completed)
                .await?;
            ctx.broadcaster
                .publish_event(
                    &HotStore::lobby_channel(lobby_id),
                    "game-end",
                    serde_json::json!({
                        "lobbyId": lobby_id.0,
                        "message": "The game has ended.",
                    }),
                )
                .await;
        }
    }
    Ok(())
}
