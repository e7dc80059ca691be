use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Requests per second used when a source is configured with zero.
pub const DEFAULT_RPS: u32 = 10;

/// Token bucket shared by every request of one source client.
///
/// The bucket holds a single token, so `N` consecutive calls to [`wait`]
/// take at least `(N - 1) / rps` seconds; there is no initial burst.
///
/// [`wait`]: RateLimiter::wait
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<DirectRateLimiter>,
    rps: NonZeroU32,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` requests; 0 falls back
    /// to [`DEFAULT_RPS`].
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second)
            .or(NonZeroU32::new(DEFAULT_RPS))
            .unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(NonZeroU32::MIN);

        Self {
            inner: Arc::new(governor::RateLimiter::direct(quota)),
            rps,
        }
    }

    /// Effective rate in requests per second.
    pub fn requests_per_second(&self) -> u32 {
        self.rps.get()
    }

    /// Wait until the next request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rps", &self.rps)
            .finish_non_exhaustive()
    }
}
