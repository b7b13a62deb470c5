//! Rate limiting for external AI provider calls

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::trace;

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Process-wide limiter shared by every caller of one provider
pub struct CallRateLimiter {
    limiter: Option<DirectLimiter>,
    label: &'static str,
}

impl CallRateLimiter {
    /// At most `requests_per_second` calls per second (minimum 1)
    pub fn per_second(label: &'static str, requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        Self {
            limiter: Some(RateLimiter::direct(Quota::per_second(rps))),
            label,
        }
    }

    /// A fixed delay between consecutive calls; a zero delay disables limiting
    pub fn with_delay(label: &'static str, delay: Duration) -> Self {
        Self {
            limiter: Quota::with_period(delay).map(RateLimiter::direct),
            label,
        }
    }

    /// No limiting at all
    pub fn unlimited(label: &'static str) -> Self {
        Self { limiter: None, label }
    }

    /// Wait until a call is allowed
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            trace!(limiter = self.label, "Waiting for rate limiter");
            limiter.until_ready().await;
        }
    }
}
