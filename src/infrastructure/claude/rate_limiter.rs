use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Request rate limiter shared by every client slot of a pool
///
/// Wraps a governor GCRA limiter with a per-minute quota; the whole quota is
/// available as an initial burst.
pub struct RequestRateLimiter {
    limiter: DefaultDirectRateLimiter,
    requests_per_minute: u32,
}

impl RequestRateLimiter {
    /// Create a limiter allowing `requests_per_minute` requests (at least 1).
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let quota = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(quota)),
            requests_per_minute: quota.get(),
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub const fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}
