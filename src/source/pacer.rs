//! Request pacing for remote sources.
//!
//! Public data portals throttle or ban clients that fetch too quickly, so
//! remote requests go through a token bucket.

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Request rate limiter shared by every fetch of one source.
#[derive(Clone, Default)]
pub struct RequestPacer {
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    per_second: u32,
}

impl RequestPacer {
    /// Allow `per_second` requests per second; 0 disables pacing.
    pub fn new(per_second: u32) -> Self {
        let limiter = NonZeroU32::new(per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self { limiter, per_second }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Wait for permission to issue one request.
    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Take a permit without waiting, if one is available.
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("per_second", &self.per_second)
            .finish()
    }
}
