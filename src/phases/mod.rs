//! C9: one handler per phase kind. Every handler takes a shared
//! [`PhaseContext`] and the event being dispatched; none of them ever
//! propagate an AI failure — those are caught and degraded locally, per the
//! per-lobby isolation rule in the design.

mod elimination;
mod round;
mod session;
mod voting;

use std::sync::Arc;

use tracing::warn;

use crate::ai_client::AiClient;
use crate::broadcaster::Broadcaster;
use crate::domain::{PhaseEvent, PhaseKind, RoundInRoute, Session};
use crate::error::PhaseError;
use crate::hotstore::HotStore;
use crate::lobby_manager::LobbyManager;
use crate::relational::RelationalStore;

/// The fallback topic used whenever `RoundAnnouncement` fails; this exact
/// string is part of the external contract, not an implementation detail.
pub const FALLBACK_TOPIC: &str = "Discuss your strategy!";

#[derive(Clone)]
pub struct PhaseContext {
    pub relational: RelationalStore,
    pub lobby_manager: LobbyManager,
    pub store: HotStore,
    pub ai_client: Arc<dyn AiClient>,
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Bounded parallelism for per-lobby AI calls within a single phase.
    pub max_concurrent_ai_calls: usize,
}

impl PhaseContext {
    /// The decision oracle has no dedicated identity field on `Session` in
    /// the data model; the session id is used as its agent identifier.
    fn agent_id(session: &Session) -> String {
        session.id.to_string()
    }
}

/// Runs the handler for `event`. Never returns an `Err` that the worker loop
/// should treat as fatal — any `PhaseError` here reflects the store being
/// unreachable, which the worker logs and advances past (see §7).
pub async fn dispatch(ctx: &PhaseContext, session: &Session, event: &PhaseEvent) -> Result<(), PhaseError> {
    let kind = event.kind;
    if matches!(kind, PhaseKind::SessionStart) {
        return session::session_start(ctx, session).await;
    }
    if matches!(kind, PhaseKind::SessionEnd) {
        return session::session_end(ctx, session).await;
    }

    let Some(round) = round_of(event, kind) else {
        return Ok(());
    };

    match kind {
        PhaseKind::AiMessageStart => round::ai_message_start(ctx, session, round).await,
        PhaseKind::AiMessageEnd => round::ai_message_end(ctx, session, round).await,
        PhaseKind::RoundStart => round::round_start(ctx, session, round).await,
        PhaseKind::RoundEnd => round::round_end(ctx, session, round).await,
        PhaseKind::EliminationStart => elimination::elimination_start(ctx, session, round).await,
        PhaseKind::EliminationEnd => elimination::elimination_end(ctx, session, round).await,
        PhaseKind::VotingStart => voting::voting_start(ctx, session, round).await,
        PhaseKind::VotingEnd => voting::voting_end(ctx, session, round).await,
        PhaseKind::SessionStart | PhaseKind::SessionEnd => unreachable!("handled above"),
    }
}

/// Per-round phases always carry a `round`; the timeline builder guarantees
/// this. A missing round here means corrupt timeline construction: logged
/// as missing data (category 2 in the error design) and the event is
/// skipped rather than panicking the worker.
fn round_of(event: &PhaseEvent, kind: PhaseKind) -> Option<&RoundInRoute> {
    let round = event.round.as_ref();
    if round.is_none() {
        warn!(?kind, "timeline event missing round context, skipping");
    }
    round
}
