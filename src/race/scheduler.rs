//! Match scheduler - drives ticks for every running match

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{RaceError, StateConflict};
use super::events::{MatchOutcome, RaceEvent, WinReason};
use super::registry::ParticipantRegistry;
use super::resolver::{resolve, TickResolution};
use super::roll::{RollProvider, SeededRolls};
use super::state::{MatchPhase, MatchState};
use super::table::MatchTable;
use super::ParticipantId;
use crate::notify::{EventBatch, Notifier, NotifyError};
use crate::store::{resolve_label, IdentityResolver, ParticipantLabel, WinCounter};

/// Longest a tick waits for a participant's display name
pub const LABEL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickFlow {
    Continue,
    Stop,
}

/// Owns the timer lifecycle of running matches.
///
/// Each match gets its own task. Ticks for one match run strictly one after
/// another; matches never share state apart from the registry and the win
/// counter. Cancelling is just removing the match from the table: the next
/// tick finds nothing and the task ends.
pub struct MatchScheduler {
    table: Arc<MatchTable>,
    registry: Arc<ParticipantRegistry>,
    notifier: Arc<dyn Notifier>,
    wins: Arc<dyn WinCounter>,
    identities: Arc<dyn IdentityResolver>,
    turn_interval: Duration,
}

impl MatchScheduler {
    pub fn new(
        table: Arc<MatchTable>,
        registry: Arc<ParticipantRegistry>,
        notifier: Arc<dyn Notifier>,
        wins: Arc<dyn WinCounter>,
        identities: Arc<dyn IdentityResolver>,
        turn_interval: Duration,
    ) -> Self {
        Self {
            table,
            registry,
            notifier,
            wins,
            identities,
            turn_interval,
        }
    }

    /// Start ticking a running match with rolls seeded from its state
    pub fn start_match(self: &Arc<Self>, match_id: Uuid) -> Result<JoinHandle<()>, RaceError> {
        let state = self
            .table
            .get(&match_id)
            .ok_or(StateConflict::NoSuchMatch(match_id))?;
        if state.phase != MatchPhase::Running {
            return Err(StateConflict::WrongPhase(state.phase.as_str()).into());
        }
        Ok(self.start_match_with(match_id, SeededRolls::new(state.seed)))
    }

    /// Start ticking with an explicit roll source
    pub fn start_match_with<R>(self: &Arc<Self>, match_id: Uuid, rolls: R) -> JoinHandle<()>
    where
        R: RollProvider + Send + 'static,
    {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_match(match_id, rolls).await;
        })
    }

    async fn run_match<R>(&self, match_id: Uuid, mut rolls: R)
    where
        R: RollProvider + Send,
    {
        info!(
            match_id = %match_id,
            interval_ms = self.turn_interval.as_millis() as u64,
            "Race started"
        );

        // the wait restarts only once the previous tick is stored and delivered
        loop {
            sleep(self.turn_interval).await;
            if self.run_tick(match_id, &mut rolls).await == TickFlow::Stop {
                break;
            }
        }

        debug!(match_id = %match_id, "Tick task finished");
    }

    async fn run_tick<R>(&self, match_id: Uuid, rolls: &mut R) -> TickFlow
    where
        R: RollProvider + ?Sized,
    {
        let Some(state) = self.table.get(&match_id) else {
            debug!(match_id = %match_id, "Match no longer live, stopping");
            return TickFlow::Stop;
        };
        if state.phase != MatchPhase::Running {
            debug!(match_id = %match_id, phase = state.phase.as_str(), "Match not running, stopping");
            return TickFlow::Stop;
        }

        let TickResolution { state: next, events } = resolve(state, rolls);
        let participants = next.participants();
        let tick = next.tick;
        let outcome = next.outcome;

        debug!(
            match_id = %match_id,
            tick,
            distance_a = next.party_a.distance,
            distance_b = next.party_b.distance,
            events = events.len(),
            "Tick resolved"
        );

        // a forfeit or cancel may have landed while resolving
        let persisted = match outcome {
            Some(_) => self.table.claim_live(&match_id).is_some(),
            None => self.table.store_running(next),
        };
        if !persisted {
            debug!(match_id = %match_id, tick, "Match removed mid-tick, dropping result");
            return TickFlow::Stop;
        }

        self.deliver(match_id, tick, participants, events).await;

        match outcome {
            Some(outcome) => {
                self.finalize(match_id, participants, outcome).await;
                TickFlow::Stop
            }
            None => TickFlow::Continue,
        }
    }

    /// Conclude a match in favour of the other participant, skipping the resolver
    pub async fn forfeit(
        &self,
        match_id: Uuid,
        forfeiting: ParticipantId,
    ) -> Result<MatchOutcome, RaceError> {
        let snapshot = self
            .table
            .get(&match_id)
            .ok_or(StateConflict::NoSuchMatch(match_id))?;
        let winner = snapshot
            .opponent_of(forfeiting)
            .ok_or(StateConflict::NotInMatch(forfeiting))?;

        let mut state = self
            .table
            .claim_live(&match_id)
            .ok_or(StateConflict::NoSuchMatch(match_id))?;

        let outcome = MatchOutcome::Winner {
            participant: winner,
            reason: WinReason::Forfeit,
        };
        state.conclude(outcome);

        info!(
            match_id = %match_id,
            forfeiting = %forfeiting,
            winner = %winner,
            "Match forfeited"
        );

        let participants = state.participants();
        let events = vec![RaceEvent::MatchConcluded {
            outcome,
            distance_a: state.party_a.distance,
            distance_b: state.party_b.distance,
        }];
        self.deliver(match_id, state.tick, participants, events).await;
        self.finalize(match_id, participants, outcome).await;

        Ok(outcome)
    }

    /// Abandon a match without a winner
    pub fn cancel(&self, match_id: Uuid) -> Option<MatchState> {
        let state = self.table.claim_live(&match_id)?;
        self.registry.release_match(match_id, state.participants());
        info!(match_id = %match_id, phase = state.phase.as_str(), "Match cancelled");
        Some(state)
    }

    async fn label(&self, participant: ParticipantId) -> ParticipantLabel {
        match timeout(LABEL_TIMEOUT, resolve_label(self.identities.as_ref(), participant)).await {
            Ok(label) => label,
            Err(_) => {
                warn!(participant = %participant, "Identity lookup timed out");
                ParticipantLabel::placeholder(participant)
            }
        }
    }

    async fn labels(&self, participants: [ParticipantId; 2]) -> [ParticipantLabel; 2] {
        let [a, b] = participants;
        let (a, b) = tokio::join!(self.label(a), self.label(b));
        [a, b]
    }

    async fn deliver(
        &self,
        match_id: Uuid,
        tick: u64,
        participants: [ParticipantId; 2],
        events: Vec<RaceEvent>,
    ) {
        if events.is_empty() {
            return;
        }

        let batch = EventBatch {
            match_id,
            tick,
            participants: self.labels(participants).await,
            events,
            emitted_at: Utc::now(),
        };

        match self.notifier.deliver(&batch).await {
            Ok(()) => {}
            Err(e @ NotifyError::NoSubscribers(_)) => {
                debug!(match_id = %match_id, tick, error = %e, "Tick events not delivered");
            }
            Err(e) => {
                warn!(match_id = %match_id, tick, error = %e, "Tick event delivery failed");
            }
        }
    }

    async fn finalize(&self, match_id: Uuid, participants: [ParticipantId; 2], outcome: MatchOutcome) {
        if let Some(winner) = outcome.winner() {
            match self.wins.increment(winner).await {
                Ok(total) => info!(match_id = %match_id, winner = %winner, total, "Win recorded"),
                Err(e) => error!(match_id = %match_id, winner = %winner, error = %e, "Failed to record win"),
            }
        }

        let released = self.registry.release_match(match_id, participants);
        info!(match_id = %match_id, outcome = ?outcome, released, "Match concluded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::roll::ScriptedRolls;
    use crate::race::state::Unit;
    use crate::store::{IdentityError, StaticIdentityResolver, WinLedger};
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);
    const INTERVAL: Duration = Duration::from_secs(7);

    struct Recorder {
        tx: mpsc::UnboundedSender<EventBatch>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn deliver(&self, batch: &EventBatch) -> Result<(), NotifyError> {
            let _ = self.tx.send(batch.clone());
            sleep(self.delay).await;
            if self.fail {
                Err(NotifyError::Delivery("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        scheduler: Arc<MatchScheduler>,
        table: Arc<MatchTable>,
        registry: Arc<ParticipantRegistry>,
        wins: Arc<WinLedger>,
        batches: mpsc::UnboundedReceiver<EventBatch>,
    }

    /// Never answers
    struct Unreachable;

    #[async_trait]
    impl IdentityResolver for Unreachable {
        async fn display_name(&self, _participant: ParticipantId) -> Result<String, IdentityError> {
            std::future::pending().await
        }
    }

    fn harness_with(fail_delivery: bool, identities: StaticIdentityResolver) -> Harness {
        harness_full(fail_delivery, Duration::ZERO, Arc::new(identities))
    }

    fn harness_full(
        fail_delivery: bool,
        delay: Duration,
        identities: Arc<dyn IdentityResolver>,
    ) -> Harness {
        let table = Arc::new(MatchTable::new());
        let registry = Arc::new(ParticipantRegistry::new());
        let wins = Arc::new(WinLedger::in_memory());
        let (tx, batches) = mpsc::unbounded_channel();
        let scheduler = Arc::new(MatchScheduler::new(
            table.clone(),
            registry.clone(),
            Arc::new(Recorder {
                tx,
                fail: fail_delivery,
                delay,
            }),
            wins.clone(),
            identities,
            INTERVAL,
        ));
        Harness {
            scheduler,
            table,
            registry,
            wins,
            batches,
        }
    }

    fn harness() -> Harness {
        harness_with(
            false,
            StaticIdentityResolver::new().with_name(A, "Ada").with_name(B, "Bo"),
        )
    }

    fn running_match(h: &Harness, track_length: u64, roster_a: &[(u32, u32)], roster_b: &[(u32, u32)]) -> Uuid {
        let mut state = MatchState::new(Uuid::new_v4(), A, B, track_length, 1).unwrap();
        for (i, (attack, health)) in roster_a.iter().enumerate() {
            state.pick(A, Unit::new(format!("a{i}"), "Alpha", *attack, *health)).unwrap();
        }
        for (i, (attack, health)) in roster_b.iter().enumerate() {
            state.pick(B, Unit::new(format!("b{i}"), "Bravo", *attack, *health)).unwrap();
        }
        state.lock(A).unwrap();
        state.lock(B).unwrap();
        let id = state.id;
        h.registry.admit_pair(A, B, id).unwrap();
        h.table.insert(state);
        id
    }

    fn last_outcome(batch: &EventBatch) -> Option<MatchOutcome> {
        match batch.events.last() {
            Some(RaceEvent::MatchConcluded { outcome, .. }) => Some(*outcome),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_the_interval_until_finish() {
        let mut h = harness();
        let id = running_match(&h, 1_000, &[(1_000, 5_000)], &[(1_000, 5_000)]);
        let rolls = ScriptedRolls::new([10, 1, 10, 1, 995, 1, 5, 1]);

        let started = Instant::now();
        let handle = h.scheduler.start_match_with(id, rolls);

        let first = h.batches.recv().await.unwrap();
        assert_eq!(first.tick, 1);
        assert!(started.elapsed() >= INTERVAL);
        assert!(started.elapsed() < INTERVAL + Duration::from_secs(1));
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.participants[0].display_name, "Ada");
        assert_eq!(h.table.get(&id).map(|s| s.party_a.distance), Some(10));

        let second = h.batches.recv().await.unwrap();
        assert_eq!(second.tick, 2);
        assert!(started.elapsed() >= INTERVAL * 2);
        assert!(started.elapsed() < INTERVAL * 2 + Duration::from_secs(1));
        assert_eq!(
            last_outcome(&second),
            Some(MatchOutcome::Winner {
                participant: A,
                reason: WinReason::FinishLine
            })
        );

        handle.await.unwrap();
        assert_eq!(h.wins.wins(A).await.unwrap(), 1);
        assert_eq!(h.wins.wins(B).await.unwrap(), 0);
        assert_eq!(h.registry.occupied(), 0);
        assert!(!h.table.contains(&id));
        assert!(h.batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_restarts_after_slow_delivery() {
        let delay = Duration::from_secs(10);
        let mut h = harness_full(
            false,
            delay,
            Arc::new(StaticIdentityResolver::new().with_name(A, "Ada").with_name(B, "Bo")),
        );
        let id = running_match(&h, 100_000, &[(10, 5_000)], &[(10, 5_000)]);
        let handle = h.scheduler.start_match_with(id, ScriptedRolls::new([1; 12]));

        let mut starts = Vec::new();
        for _ in 0..3 {
            h.batches.recv().await.unwrap();
            starts.push(Instant::now());
        }
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= delay + INTERVAL);
        }

        h.scheduler.cancel(id);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_identity_lookup_falls_back_to_placeholder() {
        let mut h = harness_full(false, Duration::ZERO, Arc::new(Unreachable));
        let id = running_match(&h, 1_000, &[(1_000, 1)], &[(10, 5_000)]);

        let started = Instant::now();
        let handle = h.scheduler.start_match_with(id, ScriptedRolls::new([1_000, 1, 3, 10]));
        let batch = h.batches.recv().await.unwrap();

        assert!(started.elapsed() >= INTERVAL + LABEL_TIMEOUT);
        assert!(started.elapsed() < INTERVAL + LABEL_TIMEOUT + Duration::from_secs(1));
        assert!(batch.participants.iter().all(|l| !l.resolved));
        assert_eq!(batch.participants[0].display_name, "Participant 1");

        handle.await.unwrap();
        assert_eq!(h.wins.wins(A).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tie_records_no_win() {
        let mut h = harness();
        let id = running_match(&h, 5_000, &[(100, 50)], &[(100, 50)]);

        let handle = h.scheduler.start_match_with(id, ScriptedRolls::new([40, 60, 40, 50]));
        let batch = h.batches.recv().await.unwrap();
        handle.await.unwrap();

        assert_eq!(last_outcome(&batch), Some(MatchOutcome::Tie { distance: 40 }));
        assert!(h.wins.leaderboard(10).await.unwrap().is_empty());
        assert_eq!(h.registry.occupied(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn forfeit_preempts_pending_tick() {
        let mut h = harness();
        let id = running_match(&h, 100_000, &[(10, 5_000)], &[(10, 5_000)]);
        let handle = h.scheduler.start_match_with(id, ScriptedRolls::default());

        let outcome = h.scheduler.forfeit(id, A).await.unwrap();
        assert_eq!(
            outcome,
            MatchOutcome::Winner {
                participant: B,
                reason: WinReason::Forfeit
            }
        );

        handle.await.unwrap();
        let batch = h.batches.recv().await.unwrap();
        assert_eq!(batch.tick, 0);
        assert_eq!(last_outcome(&batch), Some(outcome));
        assert!(h.batches.try_recv().is_err());
        assert_eq!(h.wins.wins(B).await.unwrap(), 1);
        assert_eq!(h.registry.occupied(), 0);

        // second forfeit has nothing left to act on
        assert_eq!(
            h.scheduler.forfeit(id, A).await,
            Err(RaceError::Conflict(StateConflict::NoSuchMatch(id)))
        );
        assert_eq!(h.wins.wins(B).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn outsiders_cannot_forfeit() {
        let h = harness();
        let id = running_match(&h, 1_000, &[(10, 10)], &[(10, 10)]);
        assert_eq!(
            h.scheduler.forfeit(id, ParticipantId(99)).await,
            Err(RaceError::Conflict(StateConflict::NotInMatch(ParticipantId(99))))
        );
        assert!(h.table.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_without_a_winner() {
        let mut h = harness();
        let id = running_match(&h, 1_000, &[(10, 5_000)], &[(10, 5_000)]);
        let handle = h.scheduler.start_match_with(id, ScriptedRolls::default());

        assert!(h.scheduler.cancel(id).is_some());
        handle.await.unwrap();

        assert!(h.batches.try_recv().is_err());
        assert!(h.wins.leaderboard(10).await.unwrap().is_empty());
        assert_eq!(h.registry.occupied(), 0);
        assert!(h.scheduler.cancel(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_identity_does_not_block_the_race() {
        let mut h = harness_with(false, StaticIdentityResolver::new().with_name(A, "Ada"));
        let id = running_match(&h, 1_000, &[(1_000, 1)], &[(10, 5_000)]);

        let handle = h.scheduler.start_match_with(id, ScriptedRolls::new([1_000, 1, 3, 10]));
        let batch = h.batches.recv().await.unwrap();
        handle.await.unwrap();

        assert!(batch.participants[0].resolved);
        assert!(!batch.participants[1].resolved);
        assert_eq!(batch.participants[1].display_name, "Participant 2");
        assert_eq!(h.wins.wins(A).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_does_not_stop_ticks() {
        let h = harness_with(true, StaticIdentityResolver::new());
        let id = running_match(&h, 1_000, &[(1_000, 5_000)], &[(1_000, 5_000)]);

        let handle = h
            .scheduler
            .start_match_with(id, ScriptedRolls::new([10, 1, 10, 1, 10, 1, 995, 1]));
        handle.await.unwrap();

        assert_eq!(h.wins.wins(B).await.unwrap(), 1);
        assert!(!h.table.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn matches_progress_independently() {
        let mut h = harness();
        let first = running_match(&h, 1_000, &[(1_000, 5_000)], &[(1_000, 5_000)]);

        let mut other = MatchState::new(Uuid::new_v4(), ParticipantId(3), ParticipantId(4), 1_000, 2).unwrap();
        other.pick(ParticipantId(3), Unit::new("c", "Charlie", 1_000, 5_000)).unwrap();
        other.pick(ParticipantId(4), Unit::new("d", "Delta", 1_000, 5_000)).unwrap();
        other.lock(ParticipantId(3)).unwrap();
        other.lock(ParticipantId(4)).unwrap();
        let second = other.id;
        h.registry.admit_pair(ParticipantId(3), ParticipantId(4), second).unwrap();
        h.table.insert(other);

        let one = h.scheduler.start_match_with(first, ScriptedRolls::new([1_000, 1, 1, 1]));
        let two = h.scheduler.start_match_with(second, ScriptedRolls::new([1, 1, 1_000, 1]));
        one.await.unwrap();
        two.await.unwrap();

        let mut seen = vec![h.batches.recv().await.unwrap(), h.batches.recv().await.unwrap()];
        seen.sort_by_key(|b| b.match_id == second);
        assert_eq!(last_outcome(&seen[0]).and_then(|o| o.winner()), Some(A));
        assert_eq!(last_outcome(&seen[1]).and_then(|o| o.winner()), Some(ParticipantId(4)));
        assert_eq!(h.registry.occupied(), 0);
    }

    #[tokio::test]
    async fn start_requires_a_running_match() {
        let h = harness();
        let missing = Uuid::new_v4();
        assert!(matches!(
            h.scheduler.start_match(missing),
            Err(RaceError::Conflict(StateConflict::NoSuchMatch(id))) if id == missing
        ));

        let state = MatchState::new(Uuid::new_v4(), A, B, 1_000, 0).unwrap();
        let id = state.id;
        h.table.insert(state);
        assert!(matches!(
            h.scheduler.start_match(id),
            Err(RaceError::Conflict(StateConflict::WrongPhase("forming")))
        ));
    }
}
