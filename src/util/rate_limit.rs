//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::race::ParticipantId;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limiter with one bucket per participant
pub type ParticipantLimiter = DefaultKeyedRateLimiter<ParticipantId>;

/// Race commands per participant per second
pub const COMMAND_RATE_LIMIT: u32 = 5;

/// Feed messages per WebSocket connection per second
pub const FEED_MESSAGE_RATE_LIMIT: u32 = 10;

fn quota(requests_per_second: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
}

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    Arc::new(RateLimiter::direct(quota(requests_per_second)))
}

/// Per-participant command limiter
#[derive(Clone)]
pub struct CommandLimiter {
    limiter: Arc<ParticipantLimiter>,
}

impl CommandLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota(requests_per_second))),
        }
    }

    /// Check if a command is allowed (returns true if allowed)
    pub fn check(&self, participant: ParticipantId) -> bool {
        self.limiter.check_key(&participant).is_ok()
    }

    /// Drop buckets that have fully refilled
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

impl Default for CommandLimiter {
    fn default() -> Self {
        Self::new(COMMAND_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_per_participant() {
        let limiter = CommandLimiter::new(2);
        assert!(limiter.check(ParticipantId(1)));
        assert!(limiter.check(ParticipantId(1)));
        assert!(!limiter.check(ParticipantId(1)));
        assert!(limiter.check(ParticipantId(2)));
    }

    #[test]
    fn direct_limiter_allows_burst() {
        let limiter = create_limiter(3);
        assert!((0..3).all(|_| limiter.check().is_ok()));
        assert!(limiter.check().is_err());
    }
}
