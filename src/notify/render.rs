//! Human-readable lines for race events

use crate::race::{MatchOutcome, ParticipantId, RaceEvent, WinReason};
use crate::store::ParticipantLabel;

fn name_of(labels: &[ParticipantLabel], participant: ParticipantId) -> String {
    labels
        .iter()
        .find(|l| l.participant == participant)
        .map(|l| l.display_name.clone())
        .unwrap_or_else(|| ParticipantLabel::placeholder(participant).display_name)
}

pub fn render_event(event: &RaceEvent, labels: &[ParticipantLabel]) -> String {
    match event {
        RaceEvent::UnitActed {
            participant,
            unit_name,
            movement,
            damage,
            health_left,
            distance,
            track_length,
            ..
        } => format!(
            "{}'s {} moved {} units and lost {} health (Health left: {}). Total distance: {}/{}.",
            name_of(labels, *participant),
            unit_name,
            movement,
            damage,
            health_left,
            distance,
            track_length
        ),
        RaceEvent::UnitSubstituted {
            participant,
            unit_name,
            ..
        } => format!("{}'s {} takes over!", name_of(labels, *participant), unit_name),
        RaceEvent::PartyExhausted { participant, .. } => {
            format!("{} has no units left!", name_of(labels, *participant))
        }
        RaceEvent::MatchConcluded { outcome, .. } => render_outcome(outcome, labels),
    }
}

pub fn render_outcome(outcome: &MatchOutcome, labels: &[ParticipantLabel]) -> String {
    match outcome {
        MatchOutcome::Winner {
            participant,
            reason: WinReason::FinishLine,
        } => format!(
            "{} reached the finish line and wins the race!",
            name_of(labels, *participant)
        ),
        MatchOutcome::Winner {
            participant,
            reason: WinReason::Distance,
        } => format!(
            "All units exhausted. {} wins by distance!",
            name_of(labels, *participant)
        ),
        MatchOutcome::Winner {
            participant,
            reason: WinReason::Forfeit,
        } => format!("Opponent forfeited. {} wins!", name_of(labels, *participant)),
        MatchOutcome::Tie { .. } => {
            "It's a tie! Both participants traveled the same distance.".to_string()
        }
    }
}
