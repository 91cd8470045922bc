//! Race error taxonomy

use uuid::Uuid;

use super::ParticipantId;

/// Input rejected before any state was touched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Track length {0} is outside 1000..=100000")]
    TrackLengthOutOfRange(u64),

    #[error("Rosters are limited to {max} units")]
    RosterFull { max: usize },

    #[error("Unit {0} is already on the roster")]
    DuplicateUnit(String),

    #[error("Unit {unit_id} needs attack and health of at least 1")]
    InvalidUnitStats { unit_id: String },

    #[error("Pick at least one unit before locking")]
    EmptyRoster,

    #[error("A participant cannot challenge themselves")]
    SelfChallenge,

    #[error("Match state invariant violated: {0}")]
    Invariant(&'static str),
}

/// Request conflicts with the current match or registry state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateConflict {
    #[error("Participant {0} is already in a race")]
    AlreadyInMatch(ParticipantId),

    #[error("Participant {0} is not in a race")]
    NotInMatch(ParticipantId),

    #[error("Roster already locked")]
    AlreadyLocked,

    #[error("No pending challenge")]
    NoPendingChallenge,

    #[error("Match {0} does not exist")]
    NoSuchMatch(Uuid),

    #[error("Match is not accepting that action while {0}")]
    WrongPhase(&'static str),
}

/// Errors surfaced by race operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] StateConflict),
}
