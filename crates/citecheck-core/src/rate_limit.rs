//! Request pacing for catalog calls.
//!
//! Every catalog request waits for a governor permit via `until_ready()`,
//! which spaces requests at the configured rate across all concurrent
//! workers. Pacing only delays requests; nothing is ever re-sent.

use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for governor's direct rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared limiter spacing catalog requests.
pub struct CatalogLimiter {
    limiter: DirectLimiter,
    period: Duration,
}

impl CatalogLimiter {
    /// Create a limiter with the given period between requests.
    ///
    /// Returns `None` for a zero period (no pacing).
    pub fn new(period: Duration) -> Option<Self> {
        let quota = Quota::with_period(period)?;
        Some(Self {
            limiter: DirectLimiter::direct(quota),
            period,
        })
    }

    /// Create a limiter allowing `n` requests per second. `0` disables pacing.
    pub fn per_second(n: u32) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Self::new(Duration::from_secs_f64(1.0 / f64::from(n)))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until the limiter allows a request.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for CatalogLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogLimiter")
            .field("period", &self.period)
            .finish()
    }
}
