//! Lobby service - challenges, roster picks and match hand-off to the scheduler

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::challenges::{Challenge, ChallengeBook};
use crate::race::state::validate_track_length;
use crate::race::{
    LockProgress, MatchOutcome, MatchScheduler, MatchState, MatchTable, ParticipantId,
    ParticipantRegistry, RaceError, StateConflict, ValidationError,
};
use crate::store::{CatalogError, UnitCatalog};

/// Everything a lobby command can fail with
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error(transparent)]
    Race(#[from] RaceError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<StateConflict> for LobbyError {
    fn from(err: StateConflict) -> Self {
        Self::Race(err.into())
    }
}

impl From<ValidationError> for LobbyError {
    fn from(err: ValidationError) -> Self {
        Self::Race(err.into())
    }
}

/// What a cancel request ended up doing
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cancelled", rename_all = "snake_case")]
pub enum Cancellation {
    /// The caller's own challenge was taken back
    Withdrawn { opponent: ParticipantId },
    /// A challenge addressed to the caller was turned down
    Declined { challenger: ParticipantId },
    /// A match that had not started yet was dropped
    Abandoned { match_id: Uuid },
}

/// Front door for participant commands
pub struct LobbyService {
    challenges: Mutex<ChallengeBook>,
    table: Arc<MatchTable>,
    registry: Arc<ParticipantRegistry>,
    scheduler: Arc<MatchScheduler>,
    catalog: Arc<dyn UnitCatalog>,
}

impl LobbyService {
    pub fn new(
        table: Arc<MatchTable>,
        registry: Arc<ParticipantRegistry>,
        scheduler: Arc<MatchScheduler>,
        catalog: Arc<dyn UnitCatalog>,
    ) -> Self {
        Self {
            challenges: Mutex::new(ChallengeBook::new()),
            table,
            registry,
            scheduler,
            catalog,
        }
    }

    /// Issue a challenge. Replaces any earlier challenge by the same challenger.
    pub fn challenge(
        &self,
        challenger: ParticipantId,
        opponent: ParticipantId,
        track_length: u64,
    ) -> Result<Challenge, LobbyError> {
        if challenger == opponent {
            return Err(ValidationError::SelfChallenge.into());
        }
        validate_track_length(track_length)?;
        for participant in [challenger, opponent] {
            if self.registry.contains(participant) {
                return Err(StateConflict::AlreadyInMatch(participant).into());
            }
        }

        let challenge = Challenge::new(challenger, opponent, track_length);
        let replaced = self.challenges.lock().issue(challenge.clone());

        info!(
            challenger = %challenger,
            opponent = %opponent,
            track_length,
            replaced = replaced.is_some(),
            "Challenge issued"
        );

        Ok(challenge)
    }

    /// Accept the oldest challenge addressed to `opponent` and open the match
    pub fn accept(&self, opponent: ParticipantId) -> Result<MatchState, LobbyError> {
        let challenge = self
            .challenges
            .lock()
            .take_for(opponent)
            .ok_or(StateConflict::NoPendingChallenge)?;

        let state = MatchState::new(
            Uuid::new_v4(),
            challenge.challenger,
            challenge.opponent,
            challenge.track_length,
            rand::random::<u64>(),
        )?;

        if let Err(e) = self
            .registry
            .admit_pair(challenge.challenger, challenge.opponent, state.id)
        {
            warn!(
                challenger = %challenge.challenger,
                opponent = %opponent,
                error = %e,
                "Challenge accepted too late"
            );
            return Err(e.into());
        }
        self.table.insert(state.clone());

        // neither side can take part in another race now
        {
            let mut book = self.challenges.lock();
            book.purge(challenge.challenger);
            book.purge(challenge.opponent);
        }

        info!(
            match_id = %state.id,
            challenger = %challenge.challenger,
            opponent = %opponent,
            track_length = state.track_length,
            waited_ms = challenge.age().as_millis() as u64,
            "Match created"
        );

        Ok(state)
    }

    /// Withdraw, decline, or abandon, in that order of preference
    pub fn cancel(&self, participant: ParticipantId) -> Result<Cancellation, LobbyError> {
        {
            let mut book = self.challenges.lock();
            if let Some(withdrawn) = book.withdraw(participant) {
                info!(challenger = %participant, opponent = %withdrawn.opponent, "Challenge withdrawn");
                return Ok(Cancellation::Withdrawn {
                    opponent: withdrawn.opponent,
                });
            }
            if let Some(declined) = book.decline(participant) {
                info!(challenger = %declined.challenger, opponent = %participant, "Challenge declined");
                return Ok(Cancellation::Declined {
                    challenger: declined.challenger,
                });
            }
        }

        let match_id = self
            .registry
            .lookup(participant)
            .ok_or(StateConflict::NoPendingChallenge)?;

        let state = self
            .table
            .claim_unstarted(&match_id)
            .map_err(|phase| match phase {
                Some(phase) => StateConflict::WrongPhase(phase.as_str()),
                None => StateConflict::NoSuchMatch(match_id),
            })?;
        let released = self.registry.release_match(match_id, state.participants());

        info!(
            match_id = %match_id,
            participant = %participant,
            phase = state.phase.as_str(),
            released,
            "Match abandoned"
        );

        Ok(Cancellation::Abandoned { match_id })
    }

    /// Look up a unit and add it to the caller's roster. Returns the roster size.
    pub async fn pick(&self, participant: ParticipantId, unit_ref: &str) -> Result<usize, LobbyError> {
        let match_id = self.match_of(participant)?;
        let unit = self.catalog.lookup(participant, unit_ref).await?;
        let unit_id = unit.id.clone();

        let size = self
            .table
            .update(&match_id, |state| state.pick(participant, unit))
            .ok_or(StateConflict::NoSuchMatch(match_id))??;

        info!(
            match_id = %match_id,
            participant = %participant,
            unit_id = %unit_id,
            roster_size = size,
            "Unit picked"
        );

        Ok(size)
    }

    /// Lock the caller's roster; starts the race once both sides are locked
    pub fn lock(&self, participant: ParticipantId) -> Result<LockProgress, LobbyError> {
        let match_id = self.match_of(participant)?;

        let progress = self
            .table
            .update(&match_id, |state| state.lock(participant))
            .ok_or(StateConflict::NoSuchMatch(match_id))??;

        info!(
            match_id = %match_id,
            participant = %participant,
            progress = ?progress,
            "Roster locked"
        );

        if progress == LockProgress::Started {
            self.scheduler.start_match(match_id)?;
        }

        Ok(progress)
    }

    /// Give up the caller's match; the opponent is credited with the win
    pub async fn forfeit(&self, participant: ParticipantId) -> Result<MatchOutcome, LobbyError> {
        let match_id = self.match_of(participant)?;
        Ok(self.scheduler.forfeit(match_id, participant).await?)
    }

    /// Snapshot of the caller's match
    pub fn current(&self, participant: ParticipantId) -> Result<MatchState, LobbyError> {
        let match_id = self.match_of(participant)?;
        self.table
            .get(&match_id)
            .ok_or_else(|| StateConflict::NoSuchMatch(match_id).into())
    }

    pub fn pending_challenges(&self) -> usize {
        self.challenges.lock().len()
    }

    fn match_of(&self, participant: ParticipantId) -> Result<Uuid, StateConflict> {
        self.registry
            .lookup(participant)
            .ok_or(StateConflict::NotInMatch(participant))
    }
}
