use tracing::warn;

use crate::broadcaster::BroadcasterExt;
use crate::domain::{LobbyStatus, RoundInRoute, Session};
use crate::error::PhaseError;
use crate::hotstore::HotStore;

use super::PhaseContext;

pub async fn voting_start(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    for lobby in ctx.lobby_manager.get_active_lobbies(session.id).await? {
        ctx.lobby_manager
            .clear_votes(session.id, lobby.lobby_id, round.sequence_number)
            .await?;
    }

    let Some(current_round) = session.round(round.round_id) else {
        warn!(session_id = %session.id, round = round.sequence_number, "voting-start: round missing from session, skipping broadcast");
        return Ok(());
    };

    ctx.broadcaster
        .publish_event(
            HotStore::ROUNDS_CHANNEL,
            "voting-start",
            serde_json::json!({
                "sessionId": session.id.0,
                "roundNumber": round.sequence_number,
                "votingStartTime": chrono::Utc::now(),
                "votingEndTime": current_round.voting_end_time,
            }),
        )
        .await;
    Ok(())
}

pub async fn voting_end(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    for lobby in ctx.lobby_manager.get_active_lobbies(session.id).await? {
        let lobby_id = lobby.lobby_id;
        let tally = ctx
            .lobby_manager
            .get_voting_results(session.id, lobby_id, round.sequence_number)
            .await?;
        let result = tally.result();

        ctx.broadcaster
            .publish_event(
                &HotStore::lobby_channel(lobby_id),
                "voting-result",
                serde_json::json!({
                    "lobbyId": lobby_id.0,
                    "result": match result {
                        crate::domain::VoteChoice::Continue => "continue",
                        crate::domain::VoteChoice::Share => "share",
                    },
                }),
            )
            .await;

        if result == crate::domain::VoteChoice::Share {
            ctx.lobby_manager
                .update_lobby_status(session.id, lobby_id, LobbyStatus::Completed)
                .await?;
        }

        ctx.lobby_manager
            .clear_votes(session.id, lobby_id, round.sequence_number)
            .await?;
    }
    Ok(())
}
