//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Input rate limiter for WebSocket messages (per connection)
pub const SOCKET_INPUT_RATE_LIMIT: u32 = 2; // Max 2 user messages per second

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(SOCKET_INPUT_RATE_LIMIT),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-user limiter for LLM-backed endpoints
#[derive(Clone)]
pub struct UserRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<Uuid>>,
}

impl UserRateLimiter {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Returns true if `user_id` may make another request now
    pub fn check(&self, user_id: Uuid) -> bool {
        self.limiter.check_key(&user_id).is_ok()
    }

    /// Forget users whose buckets have fully refilled
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_limiter_is_per_key() {
        let limiter = UserRateLimiter::per_minute(2);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert!(limiter.check(alice));
        assert!(limiter.check(alice));
        assert!(!limiter.check(alice));
        assert!(limiter.check(bob));
    }

    #[test]
    fn zero_quota_falls_back_to_one() {
        let limiter = UserRateLimiter::per_minute(0);
        let user = Uuid::new_v4();
        assert!(limiter.check(user));
        assert!(!limiter.check(user));
    }
}
