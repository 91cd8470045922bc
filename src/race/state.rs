//! Match state: rosters, progress and phase

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{RaceError, StateConflict, ValidationError};
use super::events::MatchOutcome;
use super::{ParticipantId, MAX_ROSTER_SIZE, MAX_TRACK_LENGTH, MIN_TRACK_LENGTH};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Challenge accepted, both parties picking
    Forming,
    /// At least one party has locked
    RosterLocking,
    /// Ticks are being resolved
    Running,
    /// Winner (or tie) decided
    Concluded,
}

impl MatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forming => "forming",
            Self::RosterLocking => "roster_locking",
            Self::Running => "running",
            Self::Concluded => "concluded",
        }
    }

    /// Rosters can still change
    pub fn is_picking(self) -> bool {
        matches!(self, Self::Forming | Self::RosterLocking)
    }
}

/// A roster entry with fixed roll bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub display_name: String,
    /// Upper bound of the movement roll
    pub max_attack: u32,
    /// Health the unit enters the race with
    pub max_health: u32,
}

impl Unit {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, max_attack: u32, max_health: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            max_attack,
            max_health,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attack == 0 || self.max_health == 0 {
            return Err(ValidationError::InvalidUnitStats {
                unit_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Per-party roster locking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterStatus {
    Picking,
    Locked,
}

/// Which side of the match a party sits on. A is always resolved first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const ORDER: [Side; 2] = [Side::A, Side::B];

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// One contestant's roster and progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub participant: ParticipantId,
    pub roster: Vec<Unit>,
    pub status: RosterStatus,
    /// Equal to `roster.len()` once exhausted
    pub active_index: usize,
    /// Only meaningful while a unit is active
    pub current_health: i64,
    pub distance: u64,
}

impl Party {
    pub fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            roster: Vec::new(),
            status: RosterStatus::Picking,
            active_index: 0,
            current_health: 0,
            distance: 0,
        }
    }

    /// Append a unit while still picking
    pub fn pick(&mut self, unit: Unit) -> Result<(), RaceError> {
        if self.status == RosterStatus::Locked {
            return Err(StateConflict::AlreadyLocked.into());
        }
        unit.validate()?;
        if self.roster.iter().any(|u| u.id == unit.id) {
            return Err(ValidationError::DuplicateUnit(unit.id).into());
        }
        if self.roster.len() >= MAX_ROSTER_SIZE {
            return Err(ValidationError::RosterFull {
                max: MAX_ROSTER_SIZE,
            }
            .into());
        }
        self.roster.push(unit);
        Ok(())
    }

    /// One-way `Picking -> Locked`
    pub fn lock(&mut self) -> Result<(), RaceError> {
        if self.status == RosterStatus::Locked {
            return Err(StateConflict::AlreadyLocked.into());
        }
        if self.roster.is_empty() {
            return Err(ValidationError::EmptyRoster.into());
        }
        self.status = RosterStatus::Locked;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.status == RosterStatus::Locked
    }

    pub fn is_exhausted(&self) -> bool {
        self.active_index >= self.roster.len()
    }

    pub fn active_unit(&self) -> Option<&Unit> {
        self.roster.get(self.active_index)
    }

    /// Put the first unit on the track
    pub(crate) fn reset_for_start(&mut self) {
        self.active_index = 0;
        self.distance = 0;
        self.current_health = self.roster.first().map(|u| i64::from(u.max_health)).unwrap_or(0);
    }

    /// Retire the active unit and bring in the next, if any
    pub(crate) fn advance_unit(&mut self) -> Option<&Unit> {
        self.active_index = (self.active_index + 1).min(self.roster.len());
        let next = self.roster.get(self.active_index)?;
        self.current_health = i64::from(next.max_health);
        Some(next)
    }

    fn check_invariants(&self, running: bool) -> Result<(), ValidationError> {
        if self.active_index > self.roster.len() {
            return Err(ValidationError::Invariant("active index past end of roster"));
        }
        if self.roster.len() > MAX_ROSTER_SIZE {
            return Err(ValidationError::Invariant("roster larger than allowed"));
        }
        let mut seen = HashSet::new();
        if !self.roster.iter().all(|u| seen.insert(u.id.as_str())) {
            return Err(ValidationError::Invariant("duplicate unit on roster"));
        }
        if running {
            if self.roster.is_empty() {
                return Err(ValidationError::Invariant("running party without roster"));
            }
            if let Some(unit) = self.active_unit() {
                if self.current_health > i64::from(unit.max_health) {
                    return Err(ValidationError::Invariant("health above unit maximum"));
                }
            }
        }
        Ok(())
    }
}

/// Result of a lock request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockProgress {
    /// Waiting for the opponent to lock
    Waiting,
    /// Both locked, the match is now running
    Started,
}

/// Full state of one match (owned by the match table while live)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub track_length: u64,
    pub phase: MatchPhase,
    pub tick: u64,
    pub party_a: Party,
    pub party_b: Party,
    pub created_at: DateTime<Utc>,
    pub outcome: Option<MatchOutcome>,
}

impl MatchState {
    /// Create a match for an accepted challenge. The challenger is party A.
    pub fn new(
        id: Uuid,
        challenger: ParticipantId,
        opponent: ParticipantId,
        track_length: u64,
        seed: u64,
    ) -> Result<Self, RaceError> {
        validate_track_length(track_length)?;
        if challenger == opponent {
            return Err(ValidationError::SelfChallenge.into());
        }

        Ok(Self {
            id,
            seed,
            track_length,
            phase: MatchPhase::Forming,
            tick: 0,
            party_a: Party::new(challenger),
            party_b: Party::new(opponent),
            created_at: Utc::now(),
            outcome: None,
        })
    }

    pub fn participants(&self) -> [ParticipantId; 2] {
        [self.party_a.participant, self.party_b.participant]
    }

    pub fn side_of(&self, participant: ParticipantId) -> Option<Side> {
        if self.party_a.participant == participant {
            Some(Side::A)
        } else if self.party_b.participant == participant {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn party(&self, side: Side) -> &Party {
        match side {
            Side::A => &self.party_a,
            Side::B => &self.party_b,
        }
    }

    pub fn party_mut(&mut self, side: Side) -> &mut Party {
        match side {
            Side::A => &mut self.party_a,
            Side::B => &mut self.party_b,
        }
    }

    pub fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        self.side_of(participant)
            .map(|side| self.party(side.other()).participant)
    }

    fn side_or_conflict(&self, participant: ParticipantId) -> Result<Side, RaceError> {
        self.side_of(participant)
            .ok_or_else(|| StateConflict::NotInMatch(participant).into())
    }

    /// Add a unit to a participant's roster
    pub fn pick(&mut self, participant: ParticipantId, unit: Unit) -> Result<usize, RaceError> {
        let side = self.side_or_conflict(participant)?;
        if !self.phase.is_picking() {
            return Err(StateConflict::WrongPhase(self.phase.as_str()).into());
        }
        let party = self.party_mut(side);
        party.pick(unit)?;
        Ok(party.roster.len())
    }

    /// Lock a participant's roster; starts the match once both are locked
    pub fn lock(&mut self, participant: ParticipantId) -> Result<LockProgress, RaceError> {
        let side = self.side_or_conflict(participant)?;
        if !self.phase.is_picking() {
            return Err(StateConflict::WrongPhase(self.phase.as_str()).into());
        }
        self.party_mut(side).lock()?;

        if self.party_a.is_locked() && self.party_b.is_locked() {
            self.party_a.reset_for_start();
            self.party_b.reset_for_start();
            self.phase = MatchPhase::Running;
            Ok(LockProgress::Started)
        } else {
            self.phase = MatchPhase::RosterLocking;
            Ok(LockProgress::Waiting)
        }
    }

    pub(crate) fn conclude(&mut self, outcome: MatchOutcome) {
        self.phase = MatchPhase::Concluded;
        self.outcome = Some(outcome);
    }

    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        validate_track_length(self.track_length)?;
        if self.party_a.participant == self.party_b.participant {
            return Err(ValidationError::Invariant("both parties share one participant"));
        }
        let running = self.phase == MatchPhase::Running;
        self.party_a.check_invariants(running)?;
        self.party_b.check_invariants(running)?;
        if self.phase == MatchPhase::Concluded && self.outcome.is_none() {
            return Err(ValidationError::Invariant("concluded without outcome"));
        }
        Ok(())
    }
}

pub fn validate_track_length(track_length: u64) -> Result<(), ValidationError> {
    if (MIN_TRACK_LENGTH..=MAX_TRACK_LENGTH).contains(&track_length) {
        Ok(())
    } else {
        Err(ValidationError::TrackLengthOutOfRange(track_length))
    }
}
