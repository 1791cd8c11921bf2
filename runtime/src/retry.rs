//! Backoff schedule for rerunning store transactions.
//!
//! A transaction attempt can lose an optimistic write race or hit a store
//! outage. [`retry_transient`] reruns the attempt while the caller's
//! classifier says the failure is transient, sleeping between attempts on
//! the schedule a [`RetryPolicy`] describes. `run_transaction` is the only
//! production caller.
//!
//! ```rust
//! use std::time::Duration;
//! use yatra_runtime::retry::{RetryPolicy, retry_transient};
//!
//! # async fn demo() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(20))
//!     .build();
//!
//! let committed = retry_transient(
//!     &policy,
//!     || async move { Ok::<_, String>("written") },
//!     |err: &String| err.starts_with("conflict"),
//! )
//! .await?;
//! assert_eq!(committed, "written");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How many times to rerun a transaction, and how long to wait in between.
///
/// Defaults: 5 reruns, first wait 50 ms, doubling, never longer than 2 s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Reruns after the first attempt
    pub max_retries: usize,
    /// Wait before the first rerun
    pub initial_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Start from the defaults and override what you need.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Wait before rerun number `attempt + 1`.
    ///
    /// `initial_delay * multiplier^attempt`, clamped to `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let wait = if scaled.is_finite() && scaled >= 0.0 {
            Duration::from_millis(scaled as u64)
        } else {
            self.max_delay
        };
        wait.min(self.max_delay)
    }
}

/// Builder for [`RetryPolicy`]; unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Reruns after the first attempt
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// First wait
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Longest wait
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Growth factor
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Finish the policy
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(5),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(50)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(2)),
            multiplier: self.multiplier.unwrap_or(2.0),
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy runs out.
///
/// Failures that `is_transient` rejects are returned at once, without a wait.
///
/// # Errors
///
/// The first permanent failure, or the transient failure of the last rerun.
pub async fn retry_transient<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut attempt: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut reruns = 0;
    loop {
        let err = match attempt().await {
            Ok(value) => {
                if reruns > 0 {
                    tracing::info!(reruns, "Transaction went through after rerunning");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !is_transient(&err) {
            tracing::debug!(error = %err, "Permanent failure, not rerunning");
            return Err(err);
        }
        if reruns >= policy.max_retries {
            tracing::error!(reruns, error = %err, "Giving up, rerun budget spent");
            metrics::counter!("yatra_retry_exhausted_total").increment(1);
            return Err(err);
        }

        let wait = policy.delay_for_attempt(reruns);
        tracing::warn!(reruns, wait_ms = wait.as_millis(), error = %err, "Transient failure, rerunning");
        metrics::counter!("yatra_retry_attempts_total").increment(1);
        sleep(wait).await;
        reruns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tight(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(4))
            .build()
    }

    #[test]
    fn waits_grow_geometrically_up_to_the_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(30))
            .multiplier(3.0)
            .max_delay(Duration::from_millis(500))
            .build();

        let waits: Vec<u128> = (0..5).map(|n| policy.delay_for_attempt(n).as_millis()).collect();
        assert_eq!(waits, vec![30, 90, 270, 500, 500]);
    }

    #[test]
    fn huge_attempt_numbers_stay_at_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(10_000), Duration::from_secs(2));
    }

    #[test]
    fn single_attempt_policy_never_waits() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay_for_attempt(2), Duration::ZERO);
    }

    #[tokio::test]
    async fn lost_races_are_rerun_until_commit() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result = retry_transient(
            &tight(4),
            || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err("conflict: version moved".to_string()),
                    _ => Ok("committed"),
                }
            },
            |err: &String| err.starts_with("conflict"),
        )
        .await;

        assert_eq!(result, Ok("committed"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn spent_budget_surfaces_the_last_failure() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), String> = retry_transient(
            &tight(2),
            || async move { Err(format!("conflict #{}", calls.fetch_add(1, Ordering::SeqCst))) },
            |_: &String| true,
        )
        .await;

        assert_eq!(result, Err("conflict #2".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_rerun() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), &str> = retry_transient(
            &tight(5),
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("registration not found")
            },
            |err: &&str| err.starts_with("conflict"),
        )
        .await;

        assert_eq!(result, Err("registration not found"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
