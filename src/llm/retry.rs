//! Bounded exponential backoff for capability calls.
//!
//! [`with_backoff`] runs an async operation up to `max_attempts` times,
//! retrying only errors that report themselves [`Transient`].  Every attempt
//! and every backoff sleep is raced against a [`CancellationToken`]:
//!
//! ```text
//! attempt 1 ──err(transient)──▶ sleep 500ms ──▶ attempt 2 ──err──▶ sleep 1s ──▶ attempt 3
//!     │                             │                                   │
//!     └──── cancelled ──────────────┴─────────── cancelled ─────────────┴──▶ RetryError::Cancelled
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Transient
// ---------------------------------------------------------------------------

/// Errors that know whether repeating the call might succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Backoff settings, stored under `[generation.retry]` in `settings.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; `0` is treated as `1`.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sleep before attempt `failed + 1`, after `failed` failures (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ---------------------------------------------------------------------------
// RetryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The token fired before the operation succeeded.
    #[error("cancelled")]
    Cancelled,

    /// The last error, after `attempts` tries.
    #[error("failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

// ---------------------------------------------------------------------------
// with_backoff
// ---------------------------------------------------------------------------

/// Run `op` under `policy`, racing each attempt and sleep against `cancel`.
///
/// `label` only appears in log lines.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display + std::error::Error + 'static,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = op() => result,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() || attempt >= max_attempts {
            if err.is_transient() {
                log::warn!("{label}: giving up after {attempt} attempt(s): {err}");
            }
            return Err(RetryError::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.backoff(attempt);
        log::warn!(
            "{label}: attempt {attempt}/{max_attempts} failed ({err}), retrying in {}ms",
            delay.as_millis()
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
