//! Outbound call path shared by every agent: response cache, per-provider
//! rate limiting, and transient-failure retry.
//!
//! ```text
//! call(provider, key, op)
//!   ├─ cache hit ─────────────────────────────► value
//!   └─ miss ─► retry { rate limit ─► op() } ──► store in cache ─► value
//! ```
//!
//! Neither the cache nor the limiter registry holds a lock across an await.

pub mod cache;
pub mod rate_limit;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

pub use cache::{CacheStats, ResponseCache};
pub use rate_limit::{ProviderRateLimiter, RateLimiters};
pub use retry::RetryPolicy;

use crate::error::ProviderResult;
use crate::types::config::LeadConfig;

/// Cache + limiter + retry around a provider call. Cheap to clone.
#[derive(Clone)]
pub struct ProviderGateway {
    cache: Arc<ResponseCache>,
    limiters: Arc<RateLimiters>,
    retry: RetryPolicy,
    admission_wait: Duration,
}

impl ProviderGateway {
    pub fn new(cache: Arc<ResponseCache>, limiters: Arc<RateLimiters>) -> Self {
        Self {
            cache,
            limiters,
            retry: RetryPolicy::default(),
            admission_wait: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &LeadConfig) -> Self {
        Self {
            cache: Arc::new(ResponseCache::new(config.cache_ttl())),
            limiters: Arc::new(RateLimiters::from_config(config)),
            retry: RetryPolicy::from(&config.retry),
            admission_wait: config.admission_wait(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_admission_wait(mut self, wait: Duration) -> Self {
        self.admission_wait = wait;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn limiters(&self) -> &Arc<RateLimiters> {
        &self.limiters
    }

    /// Answer from cache, or call `op` under the provider's rate limit with
    /// retries and cache the success.
    pub async fn call<T, F, Fut>(&self, provider: &str, key: &str, mut op: F) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        if let Some(cached) = self.cache.get(provider, key) {
            match serde_json::from_value(cached) {
                Ok(value) => return Ok(value),
                Err(e) => warn!(provider, key, error = %e, "discarding undecodable cache entry"),
            }
        }

        let limiter = self.limiters.for_provider(provider);
        let wait = self.admission_wait;
        let value = self
            .retry
            .run(provider, || {
                let limiter = Arc::clone(&limiter);
                let call = op();
                async move {
                    limiter.acquire(wait).await?;
                    call.await
                }
            })
            .await?;

        match serde_json::to_value(&value) {
            Ok(json) => self.cache.insert(provider, key, json),
            Err(e) => debug!(provider, key, error = %e, "response not cacheable"),
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gateway(ttl_secs: u64) -> ProviderGateway {
        let config = LeadConfig::default()
            .with_cache_ttl_seconds(ttl_secs)
            .with_rate_limit("fdic", 600);
        ProviderGateway::from_config(&config).with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_absorbs_repeat_calls_until_expiry() {
        let gateway = gateway(60);
        let calls = &AtomicU32::new(0);
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(vec!["abc bank".to_string()])
        };

        gateway.call("fdic", "banks", op).await.unwrap();
        gateway.call("fdic", "banks", op).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let value = gateway.call("fdic", "banks", op).await.unwrap();
        assert_eq!(value, vec!["abc bank".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let gateway = gateway(60);
        let calls = &AtomicU32::new(0);
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<Vec<String>, _>(ProviderError::permanent("fdic", "400"))
        };

        assert!(gateway.call("fdic", "bad", op).await.is_err());
        assert!(gateway.call("fdic", "bad", op).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(gateway.cache().is_empty());
    }

    // Real clock: governor does not follow tokio's paused time.
    #[tokio::test]
    async fn test_concurrent_callers_stay_within_rate_plus_burst() {
        // 600/min refills one permit every 100ms.
        let gateway = ProviderGateway::new(
            Arc::new(ResponseCache::new(Duration::from_secs(60))),
            Arc::new(RateLimiters::new(600, 2)),
        )
        .with_retry(RetryPolicy::none())
        .with_admission_wait(Duration::from_millis(250));
        let gateway = &gateway;
        let window = Duration::from_secs(1);
        let started = std::time::Instant::now();
        let admitted = &AtomicU32::new(0);
        let next_key = &AtomicU32::new(0);

        let callers = (0..8).map(move |_| async move {
            while started.elapsed() < window {
                let key = next_key.fetch_add(1, Ordering::SeqCst).to_string();
                let _ = gateway
                    .call("hunter", &key, move || async move {
                        if started.elapsed() < window {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok::<_, ProviderError>(())
                    })
                    .await;
            }
        });
        futures::future::join_all(callers).await;

        let admitted = admitted.load(Ordering::SeqCst);
        // rate × window + burst, plus one permit refilled on the boundary.
        assert!(admitted <= 10 + 2 + 1, "admitted {admitted} calls in {window:?}");
        assert!(admitted >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_through_gateway() {
        let gateway = gateway(60);
        let calls = &AtomicU32::new(0);
        let value = gateway
            .call("fdic", "flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::transient("fdic", "502"))
                } else {
                    Ok(42u32)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
