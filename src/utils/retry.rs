//! Bounded retry with pluggable backoff
//!
//! Retries are an iterative loop over an explicit attempt counter; the
//! ceiling is mandatory. The delay between attempts comes from a
//! [`BackoffPolicy`], which defaults to immediate retry.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Maps an attempt index to the delay slept before that attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Retry immediately
    #[default]
    None,

    /// Constant delay between attempts
    Fixed { delay_ms: u64 },

    /// Exponential growth capped at `max_delay_ms`
    Exponential {
        base_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl BackoffPolicy {
    /// Delay to sleep before the attempt with zero-based index `attempt`.
    ///
    /// The first attempt (index 0) never waits.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = match self {
            Self::None => 0,
            Self::Fixed { delay_ms } => *delay_ms,
            Self::Exponential {
                base_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let exponential = *base_delay_ms as f64 * multiplier.powi((attempt - 1) as i32);
                if exponential.is_finite() && exponential >= 0.0 {
                    (exponential as u64).min(*max_delay_ms)
                } else {
                    *max_delay_ms
                }
            }
        };

        Duration::from_millis(delay_ms)
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Delay policy between attempts
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::None,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with immediate retries
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Total attempts allowed, first attempt included
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of a retried operation together with the number of attempts made
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `operation` up to `max_attempts` times.
///
/// `operation` receives the 1-based attempt number. An error stops the loop
/// early when `should_retry` returns false. `on_retry` is called once per
/// scheduled retry with the upcoming attempt number, the error that caused
/// it and the delay about to be slept.
///
/// A `max_attempts` of zero is treated as one.
pub async fn retry_with<T, E, F, Fut, R, N>(
    max_attempts: u32,
    backoff: &BackoffPolicy,
    should_retry: R,
    mut on_retry: N,
    mut operation: F,
) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    N: FnMut(u32, &E, Duration),
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let delay = backoff.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                };
            }
            Err(e) => {
                if attempt >= max_attempts || !should_retry(&e) {
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                on_retry(attempt + 1, &e, backoff.delay_for(attempt));
            }
        }
    }
}
