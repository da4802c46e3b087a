//! Per-source rate budget and call policy.
//!
//! Each source owns its limiter; nothing is shared across source
//! boundaries, so one source exhausting its budget cannot starve another.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::retry::RetryPolicy;
use crate::SourceId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-source call policy: rate quota, deadlines, cache TTL, retries.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub source: SourceId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub call_timeout: Duration,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl SourcePolicy {
    pub fn default_for(source: SourceId) -> Self {
        // Quotas mirror each upstream's free-tier envelope.
        let (quota_limit, quota_window_secs, cache_ttl_secs) = match source {
            SourceId::Gdelt => (30, 60, 900),
            SourceId::Acled => (10, 60, 3_600),
            SourceId::OpenSanctions => (20, 60, 21_600),
            SourceId::Wikidata => (60, 60, 86_400),
            SourceId::AisHub => (6, 60, 300),
        };

        Self {
            source,
            quota_window: Duration::from_secs(quota_window_secs),
            quota_limit,
            call_timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            retry: RetryPolicy::default(),
        }
    }
}

/// Token-bucket rate limiter owned by one source's gateway slot.
#[derive(Clone)]
pub struct SourceRateLimiter {
    limiter: Arc<DirectRateLimiter>,
}

impl SourceRateLimiter {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn from_policy(policy: &SourcePolicy) -> Self {
        Self::new(policy.quota_window, policy.quota_limit)
    }

    /// True when rate budget is available; consumes one cell.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
