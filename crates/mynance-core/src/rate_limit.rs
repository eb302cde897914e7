//! Per-client token-bucket rate limiting.
//!
//! Each client IP owns a GCRA bucket (`governor`'s keyed limiter) of at most
//! `burst` cells that refills at `requests_per_minute`. The allow/deny
//! decision and the reported remaining count come from the same state
//! snapshot, taken under the shard lock of the calling IP.
//!
//! [`RateLimiter::sweep`] drops buckets that have refilled completely and
//! are therefore indistinguishable from a fresh one;
//! [`RateLimiter::spawn_sweeper`] runs it periodically in the background.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::Quota;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;

type KeyedLimiter<C> =
    governor::RateLimiter<IpAddr, DashMapStateStore<IpAddr>, C, StateInformationMiddleware>;

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Bucket capacity, reported as `X-RateLimit-Limit`.
    pub limit: u32,
    /// Requests left after this one, reported as `X-RateLimit-Remaining`.
    pub remaining: u32,
    /// On denial, how long until the next request would pass.
    pub retry_after: Option<Duration>,
}

pub struct RateLimiter<C: Clock = DefaultClock> {
    inner: KeyedLimiter<C>,
    clock: C,
    burst: u32,
    trust_forwarded: bool,
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("burst", &self.burst)
            .field("clients", &self.inner.len())
            .field("trust_forwarded", &self.trust_forwarded)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(burst: u32, requests_per_minute: u32) -> Self {
        Self::with_clock(burst, requests_per_minute, DefaultClock::default())
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.burst, config.requests_per_minute)
            .trusting_forwarded_headers(config.trust_forwarded_headers)
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    /// A limiter reading time from `clock`. A zero burst or rate is raised to one.
    pub fn with_clock(burst: u32, requests_per_minute: u32, clock: C) -> Self {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rate).allow_burst(burst);
        let inner = governor::RateLimiter::dashmap_with_clock(quota, clock.clone())
            .with_middleware::<StateInformationMiddleware>();
        Self {
            inner,
            clock,
            burst: burst.get(),
            trust_forwarded: false,
        }
    }

    /// Whether callers should key clients by forwarding headers.
    pub fn trusting_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    pub fn trusts_forwarded_headers(&self) -> bool {
        self.trust_forwarded
    }

    pub fn limit(&self) -> u32 {
        self.burst
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Takes one cell from `client`'s bucket.
    pub fn check(&self, client: IpAddr) -> Decision {
        match self.inner.check_key(&client) {
            Ok(snapshot) => Decision {
                allowed: true,
                limit: self.burst,
                remaining: snapshot.remaining_burst_capacity(),
                retry_after: None,
            },
            Err(not_until) => Decision {
                allowed: false,
                limit: self.burst,
                remaining: 0,
                retry_after: Some(not_until.wait_time_from(self.clock.now())),
            },
        }
    }

    /// Drops every bucket that has refilled completely. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain_recent();
        self.inner.shrink_to_fit();
        before.saturating_sub(self.inner.len())
    }
}

impl<C> RateLimiter<C>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    /// Runs [`sweep`](Self::sweep) every `every` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut interval = tokio::time::interval_at(start, every);
            loop {
                interval.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "evicted idle rate-limit buckets");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use std::net::Ipv4Addr;

    const MINUTE: Duration = Duration::from_secs(60);

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter() -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        (RateLimiter::with_clock(100, 200, clock.clone()), clock)
    }

    #[test]
    fn burst_then_deny_without_elapsed_time() {
        let (limiter, _clock) = limiter();

        for i in 0..100 {
            let decision = limiter.check(ip(1));
            assert!(decision.allowed, "request {i} should pass");
            assert_eq!(decision.remaining, 99 - i);
        }
        let denied = limiter.check(ip(1));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 100);
        assert!(denied.retry_after.is_some_and(|d| d <= MINUTE / 200));
    }

    #[test]
    fn one_refill_interval_grants_another_request() {
        let (limiter, clock) = limiter();
        for _ in 0..100 {
            limiter.check(ip(1));
        }
        assert!(!limiter.check(ip(1)).allowed);

        clock.advance(MINUTE / 200);
        assert!(limiter.check(ip(1)).allowed);
        assert!(!limiter.check(ip(1)).allowed);
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let (limiter, clock) = limiter();
        limiter.check(ip(1));

        clock.advance(60 * MINUTE);
        let decision = limiter.check(ip(1));
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 99);
    }

    #[test]
    fn clients_do_not_share_buckets() {
        let limiter = RateLimiter::with_clock(1, 1, FakeRelativeClock::default());
        assert!(limiter.check(ip(1)).allowed);
        assert!(!limiter.check(ip(1)).allowed);
        assert!(limiter.check(ip(2)).allowed);
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn sweep_evicts_only_refilled_buckets() {
        let (limiter, clock) = limiter();
        limiter.check(ip(1));
        clock.advance(10 * MINUTE);
        for _ in 0..50 {
            limiter.check(ip(2));
        }

        let removed = limiter.sweep();
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn evicted_client_starts_with_full_burst() {
        let (limiter, clock) = limiter();
        for _ in 0..100 {
            limiter.check(ip(1));
        }
        clock.advance(11 * MINUTE);
        limiter.sweep();
        assert!(limiter.is_empty());

        let fresh = limiter.check(ip(1));
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 99);
    }

    #[test]
    fn zero_burst_is_raised_to_one() {
        let limiter = RateLimiter::new(0, 10);
        assert_eq!(limiter.limit(), 1);
        assert!(limiter.check(ip(1)).allowed);
    }

    #[test]
    fn forwarded_headers_are_opt_in() {
        assert!(!RateLimiter::from_config(&RateLimitConfig::default()).trusts_forwarded_headers());
        let config = RateLimitConfig {
            trust_forwarded_headers: true,
            ..RateLimitConfig::default()
        };
        assert!(RateLimiter::from_config(&config).trusts_forwarded_headers());
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_evicts_idle_clients() {
        let (limiter, clock) = limiter();
        let limiter = Arc::new(limiter);
        let handle = limiter.spawn_sweeper(5 * MINUTE);

        limiter.check(ip(1));
        assert_eq!(limiter.len(), 1);

        clock.advance(11 * MINUTE);
        tokio::time::advance(5 * MINUTE).await;
        for _ in 0..10 {
            if limiter.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(limiter.is_empty());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_limiter_is_dropped() {
        let (limiter, _clock) = limiter();
        let limiter = Arc::new(limiter);
        let handle = limiter.spawn_sweeper(MINUTE);
        drop(limiter);

        tokio::time::advance(2 * MINUTE).await;
        for _ in 0..10 {
            if handle.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.is_finished());
    }
}
