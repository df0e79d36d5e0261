//! Exponential backoff for transient provider failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::types::config::RetryConfig;

/// Retry budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// runs out. Exhausted transient failures become
    /// [`ProviderError::Exhausted`], which is not retried further.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(provider, attempts = attempt, error = %e, "retries exhausted");
                    return Err(ProviderError::Exhausted {
                        provider: provider.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    debug!(provider, attempt, ?delay, error = %e, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_delay_curve_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy()
            .run("fdic", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::transient("fdic", "503"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: ProviderResult<()> = policy()
            .run("fdic", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::permanent("fdic", "400"))
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Permanent { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_downgrades_to_permanent() {
        let calls = &AtomicU32::new(0);
        let result: ProviderResult<()> = policy()
            .run("fdic", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::transient("fdic", "timeout"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::Exhausted { attempts: 4, .. }));
        assert!(!err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
