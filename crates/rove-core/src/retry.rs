//! Exponential backoff engine
//!
//! Every call that crosses a process or network boundary goes through
//! [`with_retry`]. The engine knows nothing about what it wraps; callers
//! decide which errors are worth another attempt.
//!
//! ```no_run
//! use rove_core::retry::{with_retry, Backoff, RetryPolicy};
//! use rove_core::{Result, RoveError};
//!
//! async fn fetch() -> Result<String> {
//!     Ok("data".to_string())
//! }
//!
//! async fn example() -> Result<String> {
//!     let policy = RetryPolicy::new(Backoff::default(), |e: &RoveError| e.is_server_error())
//!         .on_retry(|e, attempt| tracing::warn!("attempt {} failed: {}", attempt, e));
//!     with_retry(&policy, fetch).await
//! }
//! ```

use std::future::Future;
use std::time::Duration;

/// Attempt budget and delay schedule for one retried call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Same schedule with a different attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay slept after failed attempt number `attempt` (1-based):
    /// `min(base * multiplier^(attempt-1), max)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_delay.as_secs_f64();

        if !scaled.is_finite() || scaled >= max {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type RetryHook<E> = Box<dyn Fn(&E, u32) + Send + Sync>;

/// Backoff schedule plus the decision of which errors to retry
pub struct RetryPolicy<E> {
    backoff: Backoff,
    retry_if: Predicate<E>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> RetryPolicy<E> {
    /// Create a policy that retries errors accepted by `retry_if`
    pub fn new(backoff: Backoff, retry_if: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            backoff,
            retry_if: Box::new(retry_if),
            on_retry: None,
        }
    }

    /// Hook called with the error and the failed attempt number before each sleep
    pub fn on_retry(mut self, hook: impl Fn(&E, u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

/// Predicate that accepts every error
///
/// Only for idempotent operations; pass it explicitly so the choice is visible
/// at the call site.
pub fn retry_all<E>(_: &E) -> bool {
    true
}

/// Run `operation` until it succeeds, the predicate rejects the error, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.backoff.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !(policy.retry_if)(&err) {
                    return Err(err);
                }

                if let Some(hook) = &policy.on_retry {
                    hook(&err, attempt);
                }
                drop(err);

                let delay = policy.backoff.delay(attempt);
                tracing::debug!(
                    "Retrying in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
