// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retry-with-backoff for the HTTP data source runtime.
//!
//! The retry loop itself is transport-agnostic: callers supply an async
//! operation and a `classify` function mapping its error onto a
//! [`RetryDecision`]. [`ingest-http`](../ingest_http/index.html) is the only
//! current caller, classifying HTTP status codes and transport failures.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ingest_duration_serde::duration_millis;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a caller's `classify` function decided about one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Retry after the computed backoff delay.
    Retry,
    /// Retry after exactly this delay (from a `Retry-After` header), instead
    /// of the computed backoff.
    RetryAfter(Duration),
    /// Do not retry; propagate the error immediately.
    Fatal,
}

/// Backoff policy: `delay = min(base_backoff * backoff_factor^attempt,
/// max_backoff) * (0.75 + 0.5 * rand)` when `jitter` is enabled, dropping the
/// jitter multiplier otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial attempt. `0` means
    /// only the initial attempt (no retries).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    #[serde(with = "duration_millis")]
    pub base_backoff: Duration,
    /// Upper bound on the computed (pre-jitter) delay.
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,
    /// Multiplicative growth per attempt.
    pub backoff_factor: f64,
    /// Whether to apply the `(0.75 + 0.5 * rand)` jitter multiplier.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

/// Record of one failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// Zero-indexed attempt number.
    pub attempt: u32,
    /// Error message from this attempt.
    pub error: String,
    /// Backoff delay applied before the next attempt.
    #[serde(with = "duration_millis")]
    pub delay: Duration,
}

/// Metadata captured across all retry attempts, for logging/provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryMetadata {
    /// Total number of attempts made (including the successful one, if any).
    pub total_attempts: u32,
    /// Records of each failed attempt.
    pub failed_attempts: Vec<RetryAttempt>,
    /// Wall-clock time spanning all attempts.
    #[serde(with = "duration_millis")]
    pub total_duration: Duration,
}

/// Result of a retry-enabled operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The successfully produced value.
    pub value: T,
    /// Retry metadata (empty `failed_attempts` when the first attempt succeeds).
    pub metadata: RetryMetadata,
}

/// A cheap, dependency-free pseudo-random value in `[0, 1)`, seeded from the
/// wall clock and the attempt index so repeated calls within the same
/// attempt don't collide.
fn jitter_unit(attempt: u32) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let pseudo = nanos.wrapping_mul(attempt as u64 + 1).wrapping_add(attempt as u64);
    (pseudo % 1_000_000) as f64 / 1_000_000.0
}

/// Compute the backoff delay for a zero-indexed attempt, given an explicit
/// jitter sample in `[0, 1)`. Exposed separately from [`compute_delay`] so
/// the formula itself can be tested deterministically.
pub fn compute_delay_with_rand(policy: &RetryPolicy, attempt: u32, rand: f64) -> Duration {
    let exp = policy.backoff_factor.powi(attempt as i32);
    let nominal_ms = (policy.base_backoff.as_millis() as f64 * exp).min(policy.max_backoff.as_millis() as f64);
    let factor = if policy.jitter {
        0.75 + 0.5 * rand.clamp(0.0, 1.0)
    } else {
        1.0
    };
    Duration::from_millis((nominal_ms * factor).round() as u64)
}

/// Compute the backoff delay for a zero-indexed attempt, sampling jitter
/// from the wall clock.
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    compute_delay_with_rand(policy, attempt, jitter_unit(attempt))
}

/// Generic retry loop. Calls `op` up to `max_retries + 1` times, consulting
/// `classify` after each failure to decide whether and how long to wait
/// before retrying.
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
    classify: impl Fn(&E) -> RetryDecision,
) -> Result<RetryOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let max_attempts = policy.max_retries + 1;
    let mut failed_attempts = Vec::new();

    for attempt in 0..max_attempts {
        debug!(target: "ingest.retry", attempt, max_attempts, "attempting operation");

        match op().await {
            Ok(value) => {
                let total_duration = start.elapsed();
                debug!(
                    target: "ingest.retry",
                    attempt,
                    total_duration_ms = total_duration.as_millis() as u64,
                    "operation succeeded"
                );
                return Ok(RetryOutcome {
                    value,
                    metadata: RetryMetadata {
                        total_attempts: attempt + 1,
                        failed_attempts,
                        total_duration,
                    },
                });
            }
            Err(err) => {
                let is_last = attempt + 1 >= max_attempts;
                let decision = classify(&err);

                if decision == RetryDecision::Fatal {
                    debug!(target: "ingest.retry", error = %err, "non-retryable error, giving up");
                    return Err(err);
                }

                if is_last {
                    warn!(target: "ingest.retry", error = %err, attempt, "retries exhausted");
                    return Err(err);
                }

                let delay = match decision {
                    RetryDecision::RetryAfter(d) => d,
                    RetryDecision::Retry => compute_delay(policy, attempt),
                    RetryDecision::Fatal => unreachable!(),
                };
                warn!(
                    target: "ingest.retry",
                    error = %err,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable error, backing off"
                );

                failed_attempts.push(RetryAttempt {
                    attempt,
                    error: err.to_string(),
                    delay,
                });

                tokio::time::sleep(delay).await;
            }
        }
    }

    unreachable!("loop always returns before exhausting max_attempts iterations")
}

/// Default set of HTTP status codes considered transiently retryable.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[408, 429, 502, 503, 504];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: false,
        };
        assert_eq!(compute_delay_with_rand(&policy, 0, 0.0).as_millis(), 100);
        assert_eq!(compute_delay_with_rand(&policy, 1, 0.0).as_millis(), 200);
        assert_eq!(compute_delay_with_rand(&policy, 2, 0.0).as_millis(), 400);
    }

    #[test]
    fn delay_is_capped_at_max_backoff() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            backoff_factor: 2.0,
            jitter: false,
        };
        assert_eq!(compute_delay_with_rand(&policy, 10, 0.0).as_millis(), 500);
    }

    #[test]
    fn jitter_bounds_match_formula() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(60),
            backoff_factor: 1.0,
            jitter: true,
        };
        // nominal = 1000ms; factor ranges over [0.75, 1.25].
        assert_eq!(compute_delay_with_rand(&policy, 0, 0.0).as_millis(), 750);
        assert_eq!(compute_delay_with_rand(&policy, 0, 1.0).as_millis(), 1250);
        assert_eq!(compute_delay_with_rand(&policy, 0, 0.5).as_millis(), 1000);
    }

    #[test]
    fn jitter_disabled_ignores_rand() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(60),
            backoff_factor: 1.0,
            jitter: false,
        };
        assert_eq!(compute_delay_with_rand(&policy, 0, 1.0).as_millis(), 1000);
    }

    #[derive(Debug)]
    struct FakeError {
        message: String,
        retryable: bool,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try_with_no_failed_attempts() {
        let policy = RetryPolicy::default();
        let outcome = retry_async(
            &policy,
            || async { Ok::<_, FakeError>(42) },
            |_: &FakeError| RetryDecision::Fatal,
        )
        .await
        .unwrap();
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.metadata.total_attempts, 1);
        assert!(outcome.metadata.failed_attempts.is_empty());
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_factor: 1.0,
            jitter: false,
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let outcome = retry_async(
            &policy,
            || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FakeError {
                            message: "transient".into(),
                            retryable: true,
                        })
                    } else {
                        Ok(n)
                    }
                }
            },
            |e: &FakeError| {
                if e.retryable {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Fatal
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.value, 2);
        assert_eq!(outcome.metadata.total_attempts, 3);
        assert_eq!(outcome.metadata.failed_attempts.len(), 2);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let err = retry_async(
            &policy,
            || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async {
                    Err::<(), _>(FakeError {
                        message: "bad request".into(),
                        retryable: false,
                    })
                }
            },
            |_: &FakeError| RetryDecision::Fatal,
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "bad request");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_then_propagates_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            backoff_factor: 1.0,
            jitter: false,
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let err = retry_async(
            &policy,
            || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async {
                    Err::<(), _>(FakeError {
                        message: "always fails".into(),
                        retryable: true,
                    })
                }
            },
            |_: &FakeError| RetryDecision::Retry,
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "always fails");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_after_overrides_computed_delay() {
        let policy = RetryPolicy {
            max_retries: 1,
            base_backoff: Duration::from_secs(100),
            max_backoff: Duration::from_secs(200),
            backoff_factor: 2.0,
            jitter: false,
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let start = Instant::now();
        let outcome = retry_async(
            &policy,
            || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FakeError {
                            message: "rate limited".into(),
                            retryable: true,
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            |_: &FakeError| RetryDecision::RetryAfter(Duration::from_millis(5)),
        )
        .await
        .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.metadata.failed_attempts[0].delay, Duration::from_millis(5));
    }

    #[test]
    fn default_retry_statuses_match_spec() {
        assert_eq!(DEFAULT_RETRY_STATUSES, &[408, 429, 502, 503, 504]);
    }
}
