//! Send limiter for the SMTP provider's quota, backed by governor.
//!
//! `limit` sends per `window` become a GCRA quota with a burst of `limit` and
//! one cell replenished every `window / limit`. Waiting suspends only the
//! calling task.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::Quota;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};

type DirectLimiter<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: Option<DirectLimiter<C>>,
    clock: C,
}

impl RateLimiter<DefaultClock> {
    /// `limit == 0` or a zero `window` disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(limit: u32, window: Duration, clock: C) -> Self {
        let limiter = NonZeroU32::new(limit)
            .and_then(|burst| Quota::with_period(window / limit).map(|q| q.allow_burst(burst)))
            .map(|quota| governor::RateLimiter::direct_with_clock(quota, &clock));

        Self { limiter, clock }
    }

    /// Claim a send slot now, or report how long until one frees up.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Wait for a free slot, then claim it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Send rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}
