use tracing::warn;

use crate::broadcaster::BroadcasterExt;
use crate::error::PhaseError;
use crate::hotstore::HotStore;

use super::PhaseContext;
use crate::domain::Session;

pub async fn session_start(ctx: &PhaseContext, session: &Session) -> Result<(), PhaseError> {
    ctx.store.purge_session(session.id, session.total_rounds).await?;

    let players = ctx.relational.players_for_session(session.id).await?;
    if players.is_empty() {
        warn!(session_id = %session.id, "no registered players, skipping lobby creation");
    } else {
        let distributor = crate::distributor::PlayerDistributor::new(
            ctx.lobby_manager.clone(),
            ctx.store.clone(),
            ctx.relational.clone(),
        );
        distributor
            .distribute(session.id, session.max_total_players)
            .await?;
    }

    ctx.broadcaster
        .publish_event(
            HotStore::SESSIONS_CHANNEL,
            "session-start",
            serde_json::json!({
                "sessionId": session.id.0,
                "startTime": session.start_time,
            }),
        )
        .await;
    Ok(())
}

pub async fn session_end(ctx: &PhaseContext, session: &Session) -> Result<(), PhaseError> {
    ctx.broadcaster
        .publish_event(
            HotStore::SESSIONS_CHANNEL,
            "session-end",
            serde_json::json!({
                "sessionId": session.id.0,
                "endTime": session.end_time,
            }),
        )
        .await;
    if let Err(error) = ctx.store.publish(HotStore::SESSIONS_CHANNEL, "SESSION_END").await {
        warn!(session_id = %session.id, %error, "failed to publish SESSION_END marker");
    }
    ctx.store.purge_session(session.id, session.total_rounds).await?;
    Ok(())
}
