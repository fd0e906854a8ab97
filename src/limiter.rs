//! Per-group admission throttling.
//!
//! Uses the `governor` crate's token bucket algorithm. Every live group owns
//! one bucket shared by all writers to that group: the full burst may be
//! spent at once, then one token returns per refill period. Buckets live
//! inside group state, so decisions serialize with moderation under the
//! group lock.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;

use crate::config::RateLimitConfig;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// One group's admission bucket.
#[derive(Debug)]
pub struct RateBucket {
    limiter: DirectRateLimiter,
}

impl RateBucket {
    /// Create a bucket holding `burst` tokens, refilling one per `refill`.
    pub fn new(burst: u32, refill: Duration) -> Self {
        RateBucket {
            limiter: GovRateLimiter::direct(quota(burst, refill)),
        }
    }

    /// Create a bucket from the configured limits.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        RateBucket::new(config.burst, Duration::from_secs(config.refill_secs))
    }

    /// Spend one token. Returns `false` when the bucket is empty.
    pub fn try_admit(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn quota(burst: u32, refill: Duration) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(nonzero!(1u32));
    let refill = if refill.is_zero() { Duration::from_secs(1) } else { refill };
    Quota::with_period(refill)
        .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use governor::RateLimiter;

    #[test]
    fn burst_is_spent_then_denied() {
        let bucket = RateBucket::new(15, Duration::from_secs(120));
        for _ in 0..15 {
            assert!(bucket.try_admit());
        }
        assert!(!bucket.try_admit());
    }

    #[test]
    fn refill_restores_one_token_per_period() {
        let clock = FakeRelativeClock::default();
        let limiter =
            RateLimiter::direct_with_clock(quota(15, Duration::from_secs(120)), &clock);

        for _ in 0..15 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());

        clock.advance(Duration::from_secs(121));
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());

        clock.advance(Duration::from_secs(241));
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn degenerate_limits_fall_back_to_a_working_bucket() {
        let bucket = RateBucket::new(0, Duration::from_secs(0));
        assert!(bucket.try_admit());
        assert!(!bucket.try_admit());
    }

    #[test]
    fn buckets_are_independent() {
        let a = RateBucket::new(1, Duration::from_secs(120));
        let b = RateBucket::new(1, Duration::from_secs(120));
        assert!(a.try_admit());
        assert!(!a.try_admit());
        assert!(b.try_admit());
    }
}
