//! Reconnect policy for backend connections.
//!
//! Backends are retried on a fixed interval, forever, unless a bound is set.
//! Tests inject a bounded policy with a short interval.
//!
//! # Example
//!
//! ```rust
//! use scoreboard_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = retry_with_backoff(&policy, || async {
//!     // Your fallible operation here
//!     Ok::<_, String>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Default interval between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_retries`: `None` (retry forever)
/// - `initial_delay`: 5 seconds
/// - `max_delay`: 5 seconds
/// - `multiplier`: 1.0 (fixed interval)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt; `None` never gives up
    pub max_retries: Option<usize>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Growth factor applied per retry
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl RetryPolicy {
    /// Retry forever, sleeping `interval` between attempts.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            max_retries: None,
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
        }
    }

    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Whether another retry is allowed after `attempt` retries.
    #[must_use]
    pub fn allows_retry(&self, attempt: usize) -> bool {
        self.max_retries.is_none_or(|max| attempt < max)
    }

    /// Calculate delay for a given attempt number.
    ///
    /// delay = `initial_delay` * (multiplier ^ attempt), capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(delay_ms as u64);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Give up after this many retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay between retries.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set growth factor per retry.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    ///
    /// Without an explicit `max_delay`, the cap equals `initial_delay`, so
    /// the default policy sleeps a fixed interval.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let initial_delay = self.initial_delay.unwrap_or(DEFAULT_RECONNECT_INTERVAL);
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay,
            max_delay: self.max_delay.unwrap_or(initial_delay),
            multiplier: self.multiplier.unwrap_or(1.0),
        }
    }
}

/// Retry an async operation until it succeeds or the policy gives up.
///
/// Every failed attempt is logged with its attempt number and delay.
///
/// # Errors
///
/// Returns the last error once `policy.max_retries` retries have failed.
/// With an unbounded policy this never returns `Err`.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !policy.allows_retry(attempt) {
                    tracing::error!(
                        attempt,
                        error = %err,
                        "Operation failed after max retries"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
