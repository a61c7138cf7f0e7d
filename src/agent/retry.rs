//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;

/// How many times to try, and how long to wait between tries.
///
/// The delay after failed attempt `n` (1-based) is
/// `base_delay * factor^(n - 1)`; no delay follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            factor: 2,
        }
    }
}

/// What a retried operation produced and what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// The first value produced, if any attempt succeeded
    pub value: Option<T>,
    /// Attempts made
    pub attempts: u32,
    /// Delays slept between attempts, in order
    pub delays: Vec<Duration>,
}

impl<T> RetryOutcome<T> {
    pub fn exhausted(&self) -> bool {
        self.value.is_none()
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            factor: 1,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Run `op` until it yields a value or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut delays = Vec::new();

        for attempt in 1..=max_attempts {
            if let Some(value) = op(attempt).await {
                return RetryOutcome {
                    value: Some(value),
                    attempts: attempt,
                    delays,
                };
            }

            if attempt < max_attempts {
                let delay = self.delay_for(attempt);
                tracing::warn!(
                    operation = label,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt produced nothing, backing off"
                );
                tokio::time::sleep(delay).await;
                delays.push(delay);
            }
        }

        tracing::warn!(operation = label, attempts = max_attempts, "Retries exhausted");
        RetryOutcome {
            value: None,
            attempts: max_attempts,
            delays,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            factor: 2,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_succeeds_first_try_without_delay() {
        let outcome = fast_policy().run("test", |_| async { Some(7) }).await;
        assert_eq!(outcome.value, Some(7));
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());
    }

    #[tokio::test]
    async fn test_fail_fail_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let outcome = fast_policy()
            .run("test", move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { if attempt == 3 { Some("ok") } else { None } }
            })
            .await;

        assert_eq!(outcome.value, Some("ok"));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.delays, vec![Duration::from_millis(5), Duration::from_millis(10)]);
        assert!(outcome.delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let outcome: RetryOutcome<u8> = fast_policy().run("test", |_| async { None }).await;
        assert!(outcome.exhausted());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.delays.len(), 2);
    }

    #[tokio::test]
    async fn test_once_policy() {
        let outcome: RetryOutcome<u8> = RetryPolicy::once().run("test", |_| async { None }).await;
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());
    }
}
