//! Core types shared across the orchestrator: the relational record types
//! (`Session`, `Round`, `Player`), the hot-store record types (`Lobby`,
//! `VoteTally`, `TopicCache`), and the phase/event model the worker drives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

/// Lobby ids are unique only within a session, not globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(pub u32);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub entry_fee: i64,
    pub max_total_players: u32,
    pub total_rounds: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub rounds: Vec<Round>,
}

impl Session {
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    #[must_use]
    pub fn round(&self, round_id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|r| r.id == round_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub session_id: SessionId,
    pub sequence_number: u32,
    pub ai_message_start: DateTime<Utc>,
    pub ai_message_end: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elimination_start: DateTime<Utc>,
    pub elimination_end: DateTime<Utc>,
    pub voting_start_time: DateTime<Utc>,
    pub voting_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayerStatus {
    Active,
    Eliminated,
    Winner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub wallet_address: String,
    pub joined_at: DateTime<Utc>,
    pub status: PlayerStatus,
    pub total_rounds_played: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LobbyStatus {
    Active,
    Inactive,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub wallet_address: String,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub lobby_id: LobbyId,
    pub session_id: SessionId,
    pub players: Vec<LobbyPlayer>,
    pub created_at: DateTime<Utc>,
    pub status: LobbyStatus,
}

impl Lobby {
    #[must_use]
    pub fn remaining_players(&self) -> Vec<&LobbyPlayer> {
        if self.status != LobbyStatus::Active {
            return Vec::new();
        }
        self.players
            .iter()
            .filter(|p| p.status != PlayerStatus::Eliminated)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Continue,
    Share,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub continue_count: u64,
    pub share_count: u64,
}

impl VoteTally {
    #[must_use]
    pub fn result(&self) -> VoteChoice {
        if self.continue_count >= self.share_count {
            VoteChoice::Continue
        } else {
            VoteChoice::Share
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminatedPlayer {
    pub participant: String,
    pub reason: Option<String>,
}

/// One boundary in a session's timeline: the nine phase kinds from the
/// spec, ordered by their canonical tie-break precedence within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    SessionStart,
    AiMessageStart,
    AiMessageEnd,
    RoundStart,
    RoundEnd,
    EliminationStart,
    EliminationEnd,
    VotingStart,
    VotingEnd,
    SessionEnd,
}

impl PhaseKind {
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::AiMessageStart => "ai_message_start",
            Self::AiMessageEnd => "ai_message_end",
            Self::RoundStart => "round_start",
            Self::RoundEnd => "round_end",
            Self::EliminationStart => "elimination_start",
            Self::EliminationEnd => "elimination_end",
            Self::VotingStart => "voting_start",
            Self::VotingEnd => "voting_end",
            Self::SessionEnd => "session_end",
        }
    }

    /// Lower values sort first when two phases share a timestamp.
    const fn tie_break_rank(self) -> u8 {
        match self {
            Self::SessionStart => 0,
            Self::AiMessageStart => 1,
            Self::AiMessageEnd => 2,
            Self::RoundStart => 3,
            Self::RoundEnd => 4,
            Self::EliminationStart => 5,
            Self::EliminationEnd => 6,
            Self::VotingStart => 7,
            Self::VotingEnd => 8,
            Self::SessionEnd => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEvent {
    pub kind: PhaseKind,
    pub time: DateTime<Utc>,
    /// `None` for SESSION_START/SESSION_END, `Some` for per-round phases.
    pub round: Option<RoundInRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundInRoute {
    pub round_id: RoundId,
    pub sequence_number: u32,
}

impl PartialOrd for PhaseEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhaseEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.kind.tie_break_rank().cmp(&other.kind.tie_break_rank()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tied_vote_favors_continue() {
        let tally = VoteTally { continue_count: 2, share_count: 2 };
        assert_eq!(tally.result(), VoteChoice::Continue);
    }

    #[test]
    fn share_majority_wins() {
        let tally = VoteTally { continue_count: 1, share_count: 3 };
        assert_eq!(tally.result(), VoteChoice::Share);
    }

    #[test]
    fn remaining_players_excludes_eliminated_and_empty_lobbies() {
        let now = Utc::now();
        let lobby = Lobby {
            lobby_id: LobbyId(1),
            session_id: SessionId(1),
            players: vec![
                LobbyPlayer { wallet_address: "a".into(), status: PlayerStatus::Active },
                LobbyPlayer { wallet_address: "b".into(), status: PlayerStatus::Eliminated },
            ],
            created_at: now,
            status: LobbyStatus::Active,
        };
        assert_eq!(lobby.remaining_players().len(), 1);

        let inactive = Lobby { status: LobbyStatus::Completed, ..lobby };
        assert!(inactive.remaining_players().is_empty());
    }

    #[test]
    fn events_sort_by_time_then_canonical_phase_order() {
        let t = Utc::now();
        let mut events = vec![
            PhaseEvent { kind: PhaseKind::RoundStart, time: t, round: None },
            PhaseEvent { kind: PhaseKind::AiMessageStart, time: t, round: None },
            PhaseEvent { kind: PhaseKind::SessionEnd, time: t, round: None },
        ];
        events.sort();
        assert_eq!(
            events.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![PhaseKind::AiMessageStart, PhaseKind::RoundStart, PhaseKind::SessionEnd]
        );
    }
}
