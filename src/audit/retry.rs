// =============================================================================
// Bounded Retry Policy — exponential backoff on transient fetch failures
// =============================================================================

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FetchError;

/// How many times, and how patiently, a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.  Treated as at least 1.
    pub max_attempts: u32,
    /// Pause after the first failure.
    pub initial_delay: Duration,
    /// Multiplier applied to the pause after each further failure.
    pub backoff_factor: f64,
}

/// The last error together with how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub error: FetchError,
}

impl RetryPolicy {
    /// Pause before attempt `attempt + 1`, after `attempt` failures.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        label,
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %error,
                        "transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => {
                    warn!(label, attempt, error = %error, "giving up");
                    return Err(RetryExhausted { attempts: attempt, error });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn backoff_grows_geometrically() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let result = instant(3)
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Transient("503".into()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = instant(3)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Transient("timeout".into()))
            })
            .await;
        assert_eq!(
            result,
            Err(RetryExhausted {
                attempts: 3,
                error: FetchError::Transient("timeout".into())
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = instant(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Permanent("bad symbol".into()))
            })
            .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let result = instant(0).run("test", move || async move { Ok::<_, FetchError>("ok") }).await;
        assert_eq!(result, Ok("ok"));
    }
}
