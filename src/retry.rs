//! Exponential backoff retry policy
//!
//! A retried call is driven through a small state machine:
//!
//! ```text
//! Attempt ──ok──────────────► Succeed
//!    │
//!    ├─terminal error───────► Fail
//!    │
//!    └─retryable error─► Evaluate ──budget left──► (sleep) ──► Attempt
//!                           │
//!                           └─budget spent──────► Exhausted
//! ```
//!
//! The budget is `max_retries` retries after the first attempt, optionally
//! bounded by an overall deadline.

use crate::config::RetryConfig;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that know whether another attempt may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Final error of a retried call.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The last attempt failed with a non-retryable error.
    #[error("{0}")]
    Terminal(E),

    /// Every attempt allowed by the policy failed with a retryable error.
    #[error("retry exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Backoff policy shared by uploads, batch commits and album calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
            deadline: config.deadline_seconds.map(Duration::from_secs),
        }
    }
}

enum State<E> {
    Attempt(u32),
    Evaluate { attempt: u32, error: E },
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` until it succeeds, fails terminally, or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number and must build everything it
    /// needs afresh on each call.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut state = State::Attempt(1);

        loop {
            state = match state {
                State::Attempt(attempt) => match op(attempt).await {
                    Ok(value) => return Ok(value),
                    Err(error) if error.is_retryable() => State::Evaluate { attempt, error },
                    Err(error) => return Err(RetryError::Terminal(error)),
                },
                State::Evaluate { attempt, error } => {
                    if attempt > self.max_retries {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    let delay = self.backoff(attempt);
                    if let Some(deadline) = self.deadline {
                        if started.elapsed() + delay > deadline {
                            return Err(RetryError::Exhausted {
                                attempts: attempt,
                                last: error,
                            });
                        }
                    }

                    tracing::warn!(
                        what = what,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after error"
                    );
                    crate::metrics::record_retry(what);

                    tokio::time::sleep(delay).await;
                    State::Attempt(attempt + 1)
                }
            };
        }
    }
}
