use tracing::warn;

use crate::broadcaster::BroadcasterExt;
use crate::domain::{RoundInRoute, Session};
use crate::error::PhaseError;
use crate::hotstore::HotStore;

use super::{PhaseContext, FALLBACK_TOPIC};

pub async fn ai_message_start(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    let agent_id = PhaseContext::agent_id(session);
    let topic = match ctx
        .ai_client
        .round_announcement(&agent_id, round.sequence_number)
        .await
    {
        Ok(topic) => topic,
        Err(error) => {
            warn!(session_id = %session.id, round = round.sequence_number, %error, "round announcement failed, using fallback topic");
            FALLBACK_TOPIC.to_owned()
        }
    };

    for lobby in ctx.lobby_manager.get_active_lobbies(session.id).await? {
        let key = HotStore::topic_key(session.id, round.sequence_number, lobby.lobby_id);
        ctx.store
            .set_json(&key, &serde_json::json!({ "topicMessage": topic }))
            .await?;
    }

    ctx.broadcaster
        .publish_event(
            HotStore::ROUNDS_CHANNEL,
            "ai-message-start",
            serde_json::json!({
                "sessionId": session.id.0,
                "round": round.sequence_number,
            }),
        )
        .await;
    Ok(())
}

pub async fn ai_message_end(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    let message = topic_for_round(ctx, session, round).await?;

    ctx.broadcaster
        .publish_event(
            HotStore::ROUNDS_CHANNEL,
            "ai-message-end",
            serde_json::json!({
                "sessionId": session.id.0,
                "roundNumber": round.sequence_number,
                "message": message,
            }),
        )
        .await;
    Ok(())
}

/// Reads back the topic cached at `AI_MESSAGE_START`, which every active
/// lobby was given the same value for, via the first active lobby's key.
/// Falls back if the lobby set is empty or the cache entry has expired.
async fn topic_for_round(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<String, PhaseError> {
    let Some(lobby) = ctx.lobby_manager.get_active_lobbies(session.id).await?.into_iter().next() else {
        return Ok(FALLBACK_TOPIC.to_owned());
    };
    let key = HotStore::topic_key(session.id, round.sequence_number, lobby.lobby_id);
    let cached: Option<serde_json::Value> = ctx.store.get_json(&key).await?;
    Ok(cached
        .and_then(|v| v.get("topicMessage").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| FALLBACK_TOPIC.to_owned()))
}

pub async fn round_start(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    ctx.broadcaster
        .publish_event(
            HotStore::ROUNDS_CHANNEL,
            "round-start",
            serde_json::json!({
                "sessionId": session.id.0,
                "roundNumber": round.sequence_number,
                "startTime": chrono::Utc::now(),
            }),
        )
        .await;
    Ok(())
}

/// No elimination here; that is deferred to `ELIMINATION_START`.
pub async fn round_end(
    ctx: &PhaseContext,
    session: &Session,
    round: &RoundInRoute,
) -> Result<(), PhaseError> {
    ctx.broadcaster
        .publish_event(
            HotStore::SESSIONS_CHANNEL,
            "round-end",
            serde_json::json!({
                "sessionId": session.id.0,
                "roundNumber": round.sequence_number,
            }),
        )
        .await;
    Ok(())
}
