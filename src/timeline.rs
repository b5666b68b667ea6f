//! C8: materializes a session's timeline once, then traverses it. This is
//! what makes the worker restart-safe — `next_event` is a pure function of
//! the timeline and the current wall clock, so events already in the past
//! are simply skipped rather than re-derived from scratch.

use chrono::{DateTime, Utc};

use crate::domain::{PhaseEvent, PhaseKind, RoundInRoute, Session};

pub struct Timeline {
    events: Vec<PhaseEvent>,
}

impl Timeline {
    #[must_use]
    pub fn build(session: &Session, now: DateTime<Utc>) -> Self {
        let mut events = Vec::with_capacity(2 + session.rounds.len() * 8);

        if now < session.start_time {
            events.push(PhaseEvent {
                kind: PhaseKind::SessionStart,
                time: session.start_time,
                round: None,
            });
        }
        events.push(PhaseEvent {
            kind: PhaseKind::SessionEnd,
            time: session.end_time,
            round: None,
        });

        for round in &session.rounds {
            let r = RoundInRoute {
                round_id: round.id,
                sequence_number: round.sequence_number,
            };
            events.extend([
                PhaseEvent { kind: PhaseKind::AiMessageStart, time: round.ai_message_start, round: Some(r) },
                PhaseEvent { kind: PhaseKind::AiMessageEnd, time: round.ai_message_end, round: Some(r) },
                PhaseEvent { kind: PhaseKind::RoundStart, time: round.start_time, round: Some(r) },
                PhaseEvent { kind: PhaseKind::RoundEnd, time: round.end_time, round: Some(r) },
                PhaseEvent { kind: PhaseKind::EliminationStart, time: round.elimination_start, round: Some(r) },
                PhaseEvent { kind: PhaseKind::EliminationEnd, time: round.elimination_end, round: Some(r) },
                PhaseEvent { kind: PhaseKind::VotingStart, time: round.voting_start_time, round: Some(r) },
                PhaseEvent { kind: PhaseKind::VotingEnd, time: round.voting_end_time, round: Some(r) },
            ]);
        }

        events.sort_unstable();
        Self { events }
    }

    /// The earliest event with `time > now`, or `None` if `now >=
    /// session.end_time` (the session's terminal boundary).
    #[must_use]
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<&PhaseEvent> {
        self.events.iter().find(|event| event.time > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Round, RoundId, SessionId};
    use chrono::Duration;

    fn sample_session() -> Session {
        let start = Utc::now();
        let round = Round {
            id: RoundId(1),
            session_id: SessionId(1),
            sequence_number: 1,
            ai_message_start: start,
            ai_message_end: start + Duration::seconds(30),
            start_time: start + Duration::seconds(35),
            end_time: start + Duration::minutes(4),
            elimination_start: start + Duration::minutes(4) + Duration::seconds(5),
            elimination_end: start + Duration::minutes(5),
            voting_start_time: start + Duration::minutes(5) + Duration::seconds(5),
            voting_end_time: start + Duration::minutes(9),
        };
        Session {
            id: SessionId(1),
            name: "test".into(),
            entry_fee: 0,
            max_total_players: 10,
            total_rounds: 1,
            start_time: start,
            end_time: start + Duration::minutes(10),
            created_at: start,
            rounds: vec![round],
        }
    }

    #[test]
    fn restart_mid_round_resumes_at_next_unreached_phase() {
        let session = sample_session();
        let timeline = Timeline::build(&session, session.start_time - Duration::seconds(1));

        let restart_now = session.rounds[0].end_time + Duration::seconds(4);
        let next = timeline.next_event(restart_now).unwrap();
        assert_eq!(next.kind, PhaseKind::EliminationStart);
    }

    #[test]
    fn terminal_at_session_end() {
        let session = sample_session();
        let timeline = Timeline::build(&session, session.start_time);
        assert!(timeline.next_event(session.end_time).is_none());
    }

    #[test]
    fn session_start_skipped_when_already_started() {
        let session = sample_session();
        let timeline = Timeline::build(&session, session.start_time + Duration::seconds(1));
        assert!(timeline
            .next_event(session.start_time)
            .map(|e| e.kind != PhaseKind::SessionStart)
            .unwrap_or(true));
    }
}
