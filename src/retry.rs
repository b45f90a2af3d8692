//! Retry with exponential backoff.
//!
//! [`RetryPolicy`] is the resilience wrapper applied to a task's execute
//! phase, and usable on its own around any async operation. After a failed
//! attempt `k` (counting from 1) it waits `base_delay * 2^(k-1)`, then tries
//! again until `max_attempts` calls have been made. Waits are unbounded unless
//! a cap is set with [`RetryPolicy::with_max_delay`].
//!
//! The wrapped operation may run several times. It must be safe to repeat:
//! idempotent, or tolerant of its own side effects. The policy cannot check
//! this.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, ExecutionContext, Result, WorkflowEvent};

/// Attempt and backoff configuration.
///
/// Deserializable so it can live in an application's configuration file;
/// missing keys take their defaults. Delays are written in whole
/// milliseconds (`base_delay_ms`, `max_delay_ms`); in code they keep full
/// [`Duration`] precision.
///
/// ```rust
/// use hustle::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
/// assert_eq!(policy.max_attempts(), 2);
/// assert_eq!(policy.base_delay(), Duration::from_secs(1));
/// assert_eq!(policy.max_delay(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    max_attempts: u32,
    #[serde(rename = "base_delay_ms", with = "as_millis")]
    base_delay: Duration,
    #[serde(
        rename = "max_delay_ms",
        with = "as_optional_millis",
        skip_serializing_if = "Option::is_none"
    )]
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    /// One call plus three retries, starting at one second, no cap.
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

mod as_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::millis(*delay))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod as_optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        delay: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match delay {
            Some(delay) => serializer.serialize_some(&super::millis(*delay)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` calls (at least one).
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: None,
        }
    }

    /// Cap the wait between two attempts.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Upper bound on the number of calls.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the first failed attempt.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single wait, if one was set.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// The last failure is returned inside [`Error::ExhaustedRetries`]
    /// unchanged. Retries are logged through `tracing`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hustle::{Error, RetryPolicy};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let calls = AtomicU32::new(0);
    /// let calls = &calls;
    /// let policy = RetryPolicy::new(3, Duration::ZERO);
    ///
    /// let value = policy
    ///     .run(move || async move {
    ///         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
    ///             Err(Error::transient("connection reset"))
    ///         } else {
    ///             Ok("pong")
    ///         }
    ///     })
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(value, "pong");
    /// assert_eq!(calls.load(Ordering::SeqCst), 2);
    /// # });
    /// ```
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.drive(None, "operation", op).await
    }

    /// Like [`run`](Self::run), also reporting each retry to `ctx` and
    /// aborting as soon as `ctx` is cancelled.
    pub async fn run_observed<T, F, Fut>(
        &self,
        ctx: &ExecutionContext,
        label: &str,
        op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.drive(Some(ctx), label, op).await
    }

    async fn drive<T, F, Fut>(
        &self,
        ctx: Option<&ExecutionContext>,
        label: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let outcome = match ctx {
                Some(ctx) => tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(Error::Cancelled),
                    outcome = op() => outcome,
                },
                None => op().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                tracing::error!(label, attempts = attempt, error = %err, "retries exhausted");
                return Err(Error::ExhaustedRetries {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                label,
                attempt,
                max_attempts,
                delay_ms = millis(delay),
                error = %err,
                "attempt failed, retrying"
            );

            match ctx {
                Some(ctx) => {
                    ctx.record_retry();
                    ctx.emit(WorkflowEvent::RetryScheduled {
                        label: label.to_string(),
                        attempt,
                        delay_ms: millis(delay),
                        error: err.to_string(),
                    });
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }

            attempt += 1;
        }
    }
}
