//! Race engine - match state, tick resolution, scheduling

pub mod error;
pub mod events;
pub mod registry;
pub mod resolver;
pub mod roll;
pub mod scheduler;
pub mod state;
pub mod table;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::{RaceError, StateConflict, ValidationError};
pub use events::{MatchOutcome, RaceEvent, WinReason};
pub use registry::ParticipantRegistry;
pub use resolver::{resolve, TickResolution};
pub use roll::{RollProvider, ScriptedRolls, SeededRolls};
pub use scheduler::MatchScheduler;
pub use state::{LockProgress, MatchPhase, MatchState, Party, RosterStatus, Side, Unit};
pub use table::MatchTable;

/// Largest roster a party may pick
pub const MAX_ROSTER_SIZE: usize = 10;
/// Shortest allowed track
pub const MIN_TRACK_LENGTH: u64 = 1_000;
/// Longest allowed track
pub const MAX_TRACK_LENGTH: u64 = 100_000;
/// Upper bound of the per-tick health loss roll
pub const MAX_DAMAGE_ROLL: u32 = 1_000;

/// External identity of a race participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
