//! Bounded exponential backoff for collaborator calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::RetrySettings;
use crate::providers::CollaboratorError;

/// Retry policy configured per capability
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
    attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: 0.0,
            attempt_timeout: None,
        }
    }

    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Bound each attempt; an attempt that runs over counts as `Timeout`.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before retry number `retry`, with jitter shaving off up to
    /// `jitter` of the nominal value.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let nominal = self.nominal_delay(retry);
        if self.jitter <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let shave = rand::thread_rng().gen_range(0.0..=self.jitter);
        nominal.mul_f64(1.0 - shave)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, operation())
                    .await
                    .unwrap_or(Err(CollaboratorError::Timeout)),
                None => operation().await,
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Permanent failure, not retrying"
                    );
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
        .with_jitter(settings.jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn nominal_delay_doubles_then_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.nominal_delay(1), Duration::from_millis(100));
        assert_eq!(policy.nominal_delay(2), Duration::from_millis(200));
        assert_eq!(policy.nominal_delay(3), Duration::from_millis(350));
        assert_eq!(policy.nominal_delay(30), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast(3)
            .run("synthesize", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CollaboratorError::Unavailable("503".into()))
                } else {
                    Ok("audio")
                }
            })
            .await;

        assert_eq!(result, Ok("audio"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = fast(3)
            .run("synthesize", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::RateLimited("slow down".into()))
            })
            .await;

        assert!(matches!(result, Err(CollaboratorError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), _> = fast(5)
            .run("complete", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Rejected("bad prompt".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_timeout() {
        let policy = fast(2).with_attempt_timeout(Duration::from_millis(5));
        let result: Result<(), _> = policy
            .run("complete", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(CollaboratorError::Timeout));
    }

    proptest! {
        #[test]
        fn jittered_delay_never_exceeds_nominal(retry in 1u32..12, jitter in 0.0f64..=1.0) {
            let policy = RetryPolicy::new(12, Duration::from_millis(50), Duration::from_secs(2))
                .with_jitter(jitter);
            let delay = policy.delay_for(retry);
            prop_assert!(delay <= policy.nominal_delay(retry));
        }
    }
}
