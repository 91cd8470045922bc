//! Pending challenge book

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::race::ParticipantId;

/// A challenge waiting for the opponent's answer
#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub challenger: ParticipantId,
    pub opponent: ParticipantId,
    pub track_length: u64,
    #[serde(skip)]
    pub issued_at: Instant,
}

impl Challenge {
    pub fn new(challenger: ParticipantId, opponent: ParticipantId, track_length: u64) -> Self {
        Self {
            challenger,
            opponent,
            track_length,
            issued_at: Instant::now(),
        }
    }

    /// How long this challenge has been waiting
    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

/// Outstanding challenges, at most one per challenger
#[derive(Debug, Default)]
pub struct ChallengeBook {
    by_challenger: HashMap<ParticipantId, Challenge>,
}

impl ChallengeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a challenge, replacing the challenger's previous one
    pub fn issue(&mut self, challenge: Challenge) -> Option<Challenge> {
        self.by_challenger.insert(challenge.challenger, challenge)
    }

    /// Remove and return the oldest challenge addressed to `opponent`
    pub fn take_for(&mut self, opponent: ParticipantId) -> Option<Challenge> {
        let challenger = self
            .by_challenger
            .values()
            .filter(|c| c.opponent == opponent)
            .min_by_key(|c| c.issued_at)
            .map(|c| c.challenger)?;
        self.by_challenger.remove(&challenger)
    }

    /// Challenger withdraws their own challenge
    pub fn withdraw(&mut self, challenger: ParticipantId) -> Option<Challenge> {
        self.by_challenger.remove(&challenger)
    }

    /// Opponent turns down the oldest challenge addressed to them
    pub fn decline(&mut self, opponent: ParticipantId) -> Option<Challenge> {
        self.take_for(opponent)
    }

    /// Drop every challenge involving `participant`
    pub fn purge(&mut self, participant: ParticipantId) -> usize {
        let before = self.by_challenger.len();
        self.by_challenger
            .retain(|_, c| c.challenger != participant && c.opponent != participant);
        before - self.by_challenger.len()
    }

    pub fn len(&self) -> usize {
        self.by_challenger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_challenger.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: ParticipantId = ParticipantId(1);
    const P2: ParticipantId = ParticipantId(2);
    const P3: ParticipantId = ParticipantId(3);

    #[test]
    fn reissue_replaces_previous_challenge() {
        let mut book = ChallengeBook::new();
        assert!(book.issue(Challenge::new(P1, P2, 1_000)).is_none());
        let replaced = book.issue(Challenge::new(P1, P3, 2_000)).unwrap();
        assert_eq!(replaced.opponent, P2);
        assert_eq!(book.len(), 1);
        assert!(book.take_for(P2).is_none());
    }

    #[test]
    fn oldest_incoming_challenge_is_taken_first() {
        let mut book = ChallengeBook::new();
        let mut older = Challenge::new(P2, P1, 1_000);
        older.issued_at -= Duration::from_secs(5);
        book.issue(Challenge::new(P3, P1, 3_000));
        book.issue(older);

        let taken = book.take_for(P1).unwrap();
        assert_eq!(taken.challenger, P2);
        assert_eq!(book.take_for(P1).unwrap().challenger, P3);
        assert!(book.is_empty());
    }

    #[test]
    fn purge_drops_both_directions() {
        let mut book = ChallengeBook::new();
        book.issue(Challenge::new(P1, P2, 1_000));
        book.issue(Challenge::new(P3, P1, 1_000));
        book.issue(Challenge::new(P2, P3, 1_000));

        assert_eq!(book.purge(P1), 2);
        assert_eq!(book.len(), 1);
        assert_eq!(book.withdraw(P2).map(|c| c.opponent), Some(P3));
    }
}
