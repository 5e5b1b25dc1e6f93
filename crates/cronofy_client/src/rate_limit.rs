//! Rate limiter for the Cronofy API.
//!
//! Concurrent batch fan-out can burst well past what the provider tolerates;
//! a single shared bucket smooths those bursts into a steady request rate.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Shared outbound limiter. Cloning hands out another handle to the same
/// underlying bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<GovLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>,
}

impl RateLimiter {
    /// Create with a custom per-second limit. A zero rate is clamped to one.
    pub fn per_second(requests_per_sec: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_sec.max(1)).unwrap());
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Wait until a request slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
