//! Events emitted by the turn resolver

use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Why a participant won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// Reached the end of the track first
    FinishLine,
    /// Both parties exhausted, winner travelled further
    Distance,
    /// Opponent forfeited
    Forfeit,
}

/// Final result of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MatchOutcome {
    Winner {
        participant: ParticipantId,
        reason: WinReason,
    },
    Tie {
        distance: u64,
    },
}

impl MatchOutcome {
    pub fn winner(&self) -> Option<ParticipantId> {
        match self {
            Self::Winner { participant, .. } => Some(*participant),
            Self::Tie { .. } => None,
        }
    }
}

/// One thing that happened during a tick, in emission order.
///
/// Each variant carries everything needed to render it without looking at
/// the match state again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RaceEvent {
    UnitActed {
        participant: ParticipantId,
        unit_id: String,
        unit_name: String,
        movement: u32,
        damage: u32,
        /// Clamped at zero
        health_left: i64,
        distance: u64,
        track_length: u64,
    },

    UnitSubstituted {
        participant: ParticipantId,
        retired_unit_id: String,
        unit_id: String,
        unit_name: String,
        health: u32,
    },

    PartyExhausted {
        participant: ParticipantId,
        distance: u64,
    },

    MatchConcluded {
        outcome: MatchOutcome,
        distance_a: u64,
        distance_b: u64,
    },
}

impl RaceEvent {
    pub fn participant(&self) -> Option<ParticipantId> {
        match self {
            Self::UnitActed { participant, .. }
            | Self::UnitSubstituted { participant, .. }
            | Self::PartyExhausted { participant, .. } => Some(*participant),
            Self::MatchConcluded { .. } => None,
        }
    }
}
