//! Bounded retry with backoff.
//!
//! Every network-facing step (encryption session setup, ledger reads and
//! writes, content store access) retries transient failures under a
//! [`RetryPolicy`] supplied by configuration. Non-transient errors are
//! returned immediately and never retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Classifies an error as worth retrying.
pub trait Transient {
    /// Whether a later attempt of the same operation may succeed.
    fn is_transient(&self) -> bool;
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// The same delay every time.
    Fixed,
    /// `initial_delay * (attempt + 1)`.
    Linear,
    /// `initial_delay * 2^attempt`.
    Exponential,
}

impl BackoffStrategy {
    fn base_delay(&self, attempt: u32, initial: Duration) -> Duration {
        match self {
            BackoffStrategy::Fixed => initial,
            BackoffStrategy::Linear => initial.saturating_mul(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => {
                initial.saturating_mul(2u32.saturating_pow(attempt.min(31)))
            }
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Backoff strategy.
    pub strategy: BackoffStrategy,
    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Three attempts with exponential backoff from 100ms.
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            strategy: BackoffStrategy::Exponential,
            jitter: false,
        }
    }

    /// Three attempts with a fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: 3,
            initial_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: false,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::exponential()
        }
    }

    /// Set the total attempt budget.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// The effective attempt budget.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given zero-based attempt failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self
            .strategy
            .base_delay(attempt, self.initial_delay)
            .min(self.max_delay);

        if !self.jitter || base.is_zero() {
            return base;
        }

        let jitter_ms = (base.as_millis() as f64 * 0.1 * rand::thread_rng().gen::<f64>()) as u64;
        (base + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails non-transiently, or the
    /// attempt budget runs out. The closure receives the zero-based
    /// attempt number. The last error is returned on exhaustion.
    pub async fn execute<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + std::fmt::Display,
    {
        let budget = self.attempts();
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt + 1 < budget => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        budget,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Flaky,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy = RetryPolicy::exponential().with_max_delay(Duration::from_millis(300));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(40), Duration::from_millis(300));
    }

    #[test]
    fn test_linear_and_fixed_delays() {
        let mut policy = RetryPolicy::exponential();
        policy.strategy = BackoffStrategy::Linear;
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));

        let fixed = RetryPolicy::fixed(Duration::from_millis(50));
        assert_eq!(fixed.delay_for(7), Duration::from_millis(50));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::exponential().with_max_attempts(0).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::exponential().with_max_attempts(5);

        let result: Result<u32, TestError> = policy
            .execute("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(TestError::Flaky)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(4);

        let result: Result<(), TestError> = policy
            .execute("down", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Flaky) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Flaky)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::exponential().with_max_attempts(10);

        let result: Result<(), TestError> = policy
            .execute("fatal", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
