//! Participant -> match occupancy

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

use super::error::StateConflict;
use super::ParticipantId;

/// Tracks which participants sit in a pending or running match.
///
/// A participant occupies at most one entry. Pair admission and release take
/// the table lock once so both entries change together or not at all.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    entries: Mutex<HashMap<ParticipantId, Uuid>>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, participant: ParticipantId, match_id: Uuid) -> Result<(), StateConflict> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&participant) {
            return Err(StateConflict::AlreadyInMatch(participant));
        }
        entries.insert(participant, match_id);
        Ok(())
    }

    /// Admit both sides of an accepted challenge, both-or-neither
    pub fn admit_pair(
        &self,
        first: ParticipantId,
        second: ParticipantId,
        match_id: Uuid,
    ) -> Result<(), StateConflict> {
        let mut entries = self.entries.lock();
        for participant in [first, second] {
            if entries.contains_key(&participant) {
                return Err(StateConflict::AlreadyInMatch(participant));
            }
        }
        entries.insert(first, match_id);
        entries.insert(second, match_id);
        Ok(())
    }

    pub fn lookup(&self, participant: ParticipantId) -> Option<Uuid> {
        self.entries.lock().get(&participant).copied()
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.entries.lock().contains_key(&participant)
    }

    pub fn release(&self, participant: ParticipantId) -> Option<Uuid> {
        self.entries.lock().remove(&participant)
    }

    /// Release every listed participant still mapped to `match_id`.
    /// Entries pointing at another match are left alone.
    pub fn release_match(&self, match_id: Uuid, participants: [ParticipantId; 2]) -> usize {
        let mut entries = self.entries.lock();
        let mut released = 0;
        for participant in participants {
            if entries.get(&participant) == Some(&match_id) {
                entries.remove(&participant);
                released += 1;
            }
        }
        released
    }

    /// Number of occupied participants
    pub fn occupied(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: ParticipantId = ParticipantId(1);
    const P2: ParticipantId = ParticipantId(2);
    const P3: ParticipantId = ParticipantId(3);

    #[test]
    fn second_admission_conflicts() {
        let registry = ParticipantRegistry::new();
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());

        registry.admit(P1, m1).unwrap();
        assert_eq!(registry.admit(P1, m2), Err(StateConflict::AlreadyInMatch(P1)));
        assert_eq!(registry.lookup(P1), Some(m1));
    }

    #[test]
    fn pair_admission_is_all_or_nothing() {
        let registry = ParticipantRegistry::new();
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        registry.admit(P2, m1).unwrap();

        assert_eq!(
            registry.admit_pair(P1, P2, m2),
            Err(StateConflict::AlreadyInMatch(P2))
        );
        assert_eq!(registry.lookup(P1), None);
        assert_eq!(registry.occupied(), 1);

        registry.admit_pair(P1, P3, m2).unwrap();
        assert_eq!(registry.lookup(P1), Some(m2));
        assert_eq!(registry.lookup(P3), Some(m2));
    }

    #[test]
    fn release_match_skips_foreign_entries() {
        let registry = ParticipantRegistry::new();
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        registry.admit(P1, m1).unwrap();
        registry.admit(P2, m2).unwrap();

        assert_eq!(registry.release_match(m1, [P1, P2]), 1);
        assert!(!registry.contains(P1));
        assert!(registry.contains(P2));
        assert_eq!(registry.release(P2), Some(m2));
        assert_eq!(registry.release(P2), None);
    }

    #[test]
    fn concurrent_admissions_admit_exactly_one() {
        let registry = std::sync::Arc::new(ParticipantRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.admit_pair(P1, P2, Uuid::new_v4()).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.occupied(), 2);
    }
}
