//! Per-provider admission control using the governor crate.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::types::config::LeadConfig;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Token bucket for one provider.
pub struct ProviderRateLimiter {
    provider: String,
    per_minute: u32,
    limiter: DirectRateLimiter,
}

impl ProviderRateLimiter {
    /// `per_minute` sustained, at most `burst` back to back.
    pub fn new(provider: impl Into<String>, per_minute: u32, burst: u32) -> Self {
        let quota = Quota::per_minute(non_zero(per_minute)).allow_burst(non_zero(burst));
        Self {
            provider: provider.into(),
            per_minute,
            limiter: RateLimiter::direct(quota),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Take a permit now or fail with "retry later".
    pub fn try_acquire(&self) -> ProviderResult<()> {
        self.limiter
            .check()
            .map_err(|_| ProviderError::RateLimited {
                provider: self.provider.clone(),
            })
    }

    /// Wait up to `max_wait` for a permit.
    pub async fn acquire(&self, max_wait: Duration) -> ProviderResult<()> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        debug!(provider = %self.provider, "waiting for rate limit permit");
        tokio::time::timeout(max_wait, self.limiter.until_ready())
            .await
            .map_err(|_| ProviderError::RateLimited {
                provider: self.provider.clone(),
            })
    }
}

/// One limiter per provider, created on first use.
pub struct RateLimiters {
    limiters: DashMap<String, Arc<ProviderRateLimiter>>,
    per_provider: std::collections::BTreeMap<String, u32>,
    default_rate: u32,
    burst: u32,
}

impl RateLimiters {
    pub fn new(default_rate: u32, burst: u32) -> Self {
        Self {
            limiters: DashMap::new(),
            per_provider: Default::default(),
            default_rate,
            burst,
        }
    }

    pub fn from_config(config: &LeadConfig) -> Self {
        Self {
            limiters: DashMap::new(),
            per_provider: config.rate_limit_per_provider.clone(),
            default_rate: config.default_rate_limit,
            burst: config.rate_limit_burst,
        }
    }

    pub fn with_rate(mut self, provider: impl Into<String>, per_minute: u32) -> Self {
        self.per_provider.insert(provider.into(), per_minute);
        self
    }

    /// Limiter for `provider`. The map lock is released before returning.
    pub fn for_provider(&self, provider: &str) -> Arc<ProviderRateLimiter> {
        if let Some(limiter) = self.limiters.get(provider) {
            return Arc::clone(limiter.value());
        }
        let rate = self
            .per_provider
            .get(provider)
            .copied()
            .unwrap_or(self.default_rate);
        let entry = self
            .limiters
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(ProviderRateLimiter::new(provider, rate, self.burst)));
        Arc::clone(entry.value())
    }
}
