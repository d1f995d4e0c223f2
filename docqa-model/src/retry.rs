//! Caller-side retry with exponential backoff.
//!
//! Clients in this workspace make one backend call per operation. Front ends
//! that want resilience wrap whole operations with [`retry_with_backoff`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry. Doubles on every further retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    /// A policy with `max_retries` retries and the default delays.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, base_delay: DEFAULT_BASE_DELAY, max_delay: DEFAULT_MAX_DELAY }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy's retries are exhausted.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ModelError;

    #[test]
    fn delays_double_then_cap() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(
            &RetryPolicy::new(3),
            "test",
            ModelError::is_retryable,
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ModelError::unavailable("mock", "down"))
                } else {
                    Ok("done")
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_backoff(&RetryPolicy::new(2), "test", ModelError::is_retryable, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ModelError::unavailable("mock", "down"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_backoff(&RetryPolicy::new(5), "test", ModelError::is_retryable, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ModelError::Api { provider: "mock".into(), status: 400, message: "bad".into() })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn delay_is_monotone_and_bounded(
            attempt in 0u32..64,
            base_ms in 1u64..2_000,
            cap_ms in 1u64..60_000,
        ) {
            let policy = RetryPolicy::new(3)
                .with_base_delay(Duration::from_millis(base_ms))
                .with_max_delay(Duration::from_millis(cap_ms));
            let delay = policy.delay_for(attempt);
            prop_assert!(delay <= Duration::from_millis(cap_ms));
            prop_assert!(delay >= Duration::from_millis(base_ms.min(cap_ms)));
            if attempt > 0 {
                prop_assert!(delay >= policy.delay_for(attempt - 1));
            }
        }
    }
}
