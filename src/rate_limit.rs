//! # Probe Rate Limiting
//!
//! Optional token-bucket throttle applied by workers between candidates,
//! on top of the bounded worker pool. Uses the `governor` crate. Disabled
//! by default; the pool cap is the primary protection for the target and
//! the local network stack.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SubsweepError};

/// Rate limiting policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum number of probes per time period
    pub max_operations: u32,
    /// Time period for the rate limit
    pub period: Duration,
}

impl RateLimitPolicy {
    /// Create a new rate limit policy
    pub fn new(max_operations: u32, period: Duration) -> Self {
        Self {
            max_operations,
            period,
        }
    }

    /// Policy of `ops` probes per second
    pub fn per_second(ops: u32) -> Self {
        Self::new(ops, Duration::from_secs(1))
    }

    fn to_quota(&self) -> Result<Quota> {
        let max_ops = NonZeroU32::new(self.max_operations).ok_or_else(|| {
            SubsweepError::config("Rate limit max_operations must be greater than 0")
        })?;
        let quota = Quota::with_period(self.period / self.max_operations)
            .ok_or_else(|| SubsweepError::config("Rate limit period must be greater than 0"))?;
        Ok(quota.allow_burst(max_ops))
    }
}

/// Shared limiter awaited by every worker of a run before probing
pub struct ProbeRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl ProbeRateLimiter {
    /// Build a limiter from a policy
    pub fn new(policy: &RateLimitPolicy) -> Result<Self> {
        Ok(Self {
            limiter: RateLimiter::direct(policy.to_quota()?),
        })
    }

    /// Wait until the next probe is permitted
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
