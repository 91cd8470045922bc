//! Lobby - challenges and roster commands in front of the race engine

pub mod challenges;
pub mod service;

pub use challenges::{Challenge, ChallengeBook};
pub use service::{Cancellation, LobbyError, LobbyService};
