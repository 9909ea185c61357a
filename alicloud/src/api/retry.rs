//! Retrying invoker with incremental backoff
//!
//! One logical operation is retried until it succeeds, fails with an error
//! the classifier marks fatal, or runs out of time or attempts. The wait
//! between attempts grows by a fixed step rather than multiplicatively.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::error::ApiError;

/// Retry envelope for describe calls
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub step: Duration,
    pub max_delay: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::incremental(Duration::from_secs(3), Duration::from_secs(3))
    }
}

impl RetryPolicy {
    pub fn incremental(initial: Duration, step: Duration) -> Self {
        Self {
            initial,
            step,
            max_delay: None,
            max_attempts: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn backoff(&self) -> IncrementalBackoff {
        IncrementalBackoff {
            next: self.initial,
            step: self.step,
            max: self.max_delay,
        }
    }
}

/// Yields `initial`, `initial + step`, `initial + 2 * step`, ... capped at `max`
#[derive(Debug, Clone)]
pub struct IncrementalBackoff {
    next: Duration,
    step: Duration,
    max: Option<Duration>,
}

impl Iterator for IncrementalBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = match self.max {
            Some(max) => self.next.min(max),
            None => self.next,
        };
        self.next = self.next.saturating_add(self.step);
        Some(current)
    }
}

pub fn default_classifier(err: &ApiError) -> RetryDecision {
    if err.need_retry() {
        RetryDecision::Retry
    } else {
        RetryDecision::Fatal
    }
}

/// Retries transient errors plus the given resource specific codes
pub fn retry_on(codes: &'static [&'static str]) -> impl Fn(&ApiError) -> RetryDecision {
    move |err| {
        if err.need_retry() || err.is_expected(codes) {
            RetryDecision::Retry
        } else {
            RetryDecision::Fatal
        }
    }
}

/// Runs `op` until it succeeds or `classify` marks its error fatal.
///
/// Fatal errors are returned as-is without sleeping. Once `timeout` has
/// elapsed or `policy.max_attempts` is spent, the last error is returned
/// wrapped in `ApiError::RetryTimeout`. Sleeps are clamped to the time left,
/// so the last attempt starts no later than the deadline and the total never
/// exceeds `timeout` by more than that attempt.
pub async fn retry<T, F, Fut, C>(
    timeout: Duration,
    policy: &RetryPolicy,
    mut op: F,
    classify: C,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    C: Fn(&ApiError) -> RetryDecision,
{
    let deadline = Instant::now() + timeout;
    let mut backoff = policy.backoff();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if classify(&err) == RetryDecision::Fatal {
            return Err(err);
        }

        let out_of_attempts = policy.max_attempts.is_some_and(|max| attempts >= max);
        if out_of_attempts || Instant::now() >= deadline {
            return Err(ApiError::RetryTimeout {
                attempts,
                last: Box::new(err),
            });
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let delay = backoff.next().unwrap_or(policy.initial).min(remaining);
        tracing::warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retryable error, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
