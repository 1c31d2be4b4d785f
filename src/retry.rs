//! Bounded retry with a pluggable delay function.
//!
//! Both the embedding generator and the vector store client wrap their external calls in a
//! [`RetryPolicy`]. The policy only knows how many times to retry and how long to wait between
//! attempts; the caller decides which errors are worth retrying.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Retry policy applied to fallible asynchronous operations.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: DelayFn,
}

/// Failure returned once a policy gives up on an operation.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Total number of attempts made, including the first.
    pub attempts: u32,
    /// Error produced by the final attempt.
    pub last_error: E,
}

impl RetryPolicy {
    /// Retry up to `max_retries` times, waiting `delay` between attempts.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay: Arc::new(move |_| delay),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Replace the delay function. The argument is the 1-based retry number.
    pub fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    /// Number of retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay applied before the given 1-based retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        (self.delay)(retry)
    }

    /// Run `operation` until it succeeds, the error is not retryable, or retries run out.
    pub async fn run<T, E, Op, Fut, P>(
        &self,
        mut operation: Op,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if retries < self.max_retries && is_retryable(&error) => {
                    retries += 1;
                    let delay = self.delay_for(retries);
                    tracing::warn!(
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Operation failed; retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => {
                    return Err(RetryError {
                        attempts: retries + 1,
                        last_error: error,
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(1000))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("first_delay", &self.delay_for(1))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures_without_extra_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let result = policy
            .run(
                || {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt < 3 {
                            Err(format!("attempt {attempt} failed"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| true,
            )
            .await
            .expect("third attempt succeeds");

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_with_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(2, Duration::ZERO);

        let error = policy
            .run(
                || {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Err::<(), _>(format!("failure {attempt}")) }
                },
                |_| true,
            )
            .await
            .expect_err("all attempts fail");

        assert_eq!(error.attempts, 3);
        assert_eq!(error.last_error, "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let error = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("fatal".to_string()) }
                },
                |error| error != "fatal",
            )
            .await
            .expect_err("fatal error");

        assert_eq!(error.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_fixed_delay_between_attempts() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(1000));
        let started = tokio::time::Instant::now();

        let _ = policy
            .run(|| async { Err::<(), _>("down".to_string()) }, |_| true)
            .await;

        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[test]
    fn custom_delay_function_receives_retry_number() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO)
            .with_delay_fn(|retry| Duration::from_secs(retry.into()));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.max_retries(), 3);
    }
}
