//! Turn resolution - one call per tick, pure given the roll sequence

use super::events::{MatchOutcome, RaceEvent, WinReason};
use super::roll::RollProvider;
use super::state::{MatchPhase, MatchState, Party, Side};
use super::MAX_DAMAGE_ROLL;

/// Next state plus the events produced getting there
#[derive(Debug, Clone)]
pub struct TickResolution {
    pub state: MatchState,
    pub events: Vec<RaceEvent>,
}

impl TickResolution {
    pub fn is_concluded(&self) -> bool {
        self.state.phase == MatchPhase::Concluded
    }
}

/// Resolve one tick.
///
/// Party A always acts and is checked before party B. Matches that are not
/// running come back untouched with no events.
pub fn resolve<R>(mut state: MatchState, rolls: &mut R) -> TickResolution
where
    R: RollProvider + ?Sized,
{
    let mut events = Vec::new();
    if state.phase != MatchPhase::Running {
        return TickResolution { state, events };
    }

    state.tick += 1;
    let track_length = state.track_length;
    for side in Side::ORDER {
        advance_party(state.party_mut(side), track_length, rolls, &mut events);
    }

    if let Some(outcome) = evaluate_termination(&state) {
        state.conclude(outcome);
        events.push(RaceEvent::MatchConcluded {
            outcome,
            distance_a: state.party_a.distance,
            distance_b: state.party_b.distance,
        });
    }

    TickResolution { state, events }
}

fn advance_party<R>(party: &mut Party, track_length: u64, rolls: &mut R, events: &mut Vec<RaceEvent>)
where
    R: RollProvider + ?Sized,
{
    let Some(unit) = party.active_unit() else {
        return;
    };
    let (unit_id, unit_name, max_attack) = (unit.id.clone(), unit.display_name.clone(), unit.max_attack);
    let participant = party.participant;

    let movement = rolls.uniform(1, max_attack);
    let damage = rolls.uniform(1, MAX_DAMAGE_ROLL);

    party.distance += u64::from(movement);
    party.current_health -= i64::from(damage);

    events.push(RaceEvent::UnitActed {
        participant,
        unit_id: unit_id.clone(),
        unit_name,
        movement,
        damage,
        health_left: party.current_health.max(0),
        distance: party.distance,
        track_length,
    });

    if party.current_health > 0 {
        return;
    }

    let distance = party.distance;
    match party.advance_unit() {
        Some(next) => events.push(RaceEvent::UnitSubstituted {
            participant,
            retired_unit_id: unit_id,
            unit_id: next.id.clone(),
            unit_name: next.display_name.clone(),
            health: next.max_health,
        }),
        None => events.push(RaceEvent::PartyExhausted { participant, distance }),
    }
}

/// Finish line first (A before B), then attrition.
fn evaluate_termination(state: &MatchState) -> Option<MatchOutcome> {
    let (a, b) = (&state.party_a, &state.party_b);

    if a.distance >= state.track_length {
        return Some(MatchOutcome::Winner {
            participant: a.participant,
            reason: WinReason::FinishLine,
        });
    }
    if b.distance >= state.track_length {
        return Some(MatchOutcome::Winner {
            participant: b.participant,
            reason: WinReason::FinishLine,
        });
    }

    if a.is_exhausted() && b.is_exhausted() {
        let outcome = if a.distance > b.distance {
            MatchOutcome::Winner {
                participant: a.participant,
                reason: WinReason::Distance,
            }
        } else if b.distance > a.distance {
            MatchOutcome::Winner {
                participant: b.participant,
                reason: WinReason::Distance,
            }
        } else {
            MatchOutcome::Tie {
                distance: a.distance,
            }
        };
        return Some(outcome);
    }

    None
}
