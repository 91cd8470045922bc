//! Live match states keyed by match id

use dashmap::DashMap;
use uuid::Uuid;

use super::state::{MatchPhase, MatchState};

/// Every match that has been accepted and not yet torn down.
///
/// Guards are never held across an await; callers copy state out, work on
/// it, and write it back.
#[derive(Debug, Default)]
pub struct MatchTable {
    matches: DashMap<Uuid, MatchState>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn insert(&self, state: MatchState) {
        self.matches.insert(state.id, state);
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchState> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.matches.contains_key(id)
    }

    /// Run `f` against the stored state, if present
    pub fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut MatchState) -> R) -> Option<R> {
        self.matches.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Replace a running match with its next state. Returns false when the
    /// match was removed or stopped running in the meantime.
    pub fn store_running(&self, next: MatchState) -> bool {
        match self.matches.get_mut(&next.id) {
            Some(mut entry) if entry.phase == MatchPhase::Running => {
                *entry = next;
                true
            }
            _ => false,
        }
    }

    /// Remove a match that has not concluded yet. Whoever gets `Some` back
    /// owns the teardown.
    pub fn claim_live(&self, id: &Uuid) -> Option<MatchState> {
        self.matches
            .remove_if(id, |_, state| state.phase != MatchPhase::Concluded)
            .map(|(_, state)| state)
    }

    /// Remove a match that is still picking rosters. On failure returns the
    /// phase that blocked it, or `None` when the match is gone.
    pub fn claim_unstarted(&self, id: &Uuid) -> Result<MatchState, Option<MatchPhase>> {
        match self.matches.remove_if(id, |_, state| state.phase.is_picking()) {
            Some((_, state)) => Ok(state),
            None => Err(self.matches.get(id).map(|m| m.value().phase)),
        }
    }

    pub fn live_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn running_matches(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.value().phase == MatchPhase::Running)
            .count()
    }
}
