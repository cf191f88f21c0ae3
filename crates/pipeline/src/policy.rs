//! Retry arithmetic and failure-policy resolution.
//!
//! Pure decisions only; the executor owns sleeping and invocation.

use std::time::Duration;

use serde_json::Value;

use crate::config::{ErrorConfig, ErrorStrategy, RetryConfig};
use crate::result::is_empty_data;
use crate::FetchError;

/// Backoff used when the `retry` strategy supplies only `maxRetries`.
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded re-invocation schedule for a raw fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub backoff: Duration,
    /// Double the delay on every retry.
    pub exponential: bool,
}

impl RetryPolicy {
    /// Exactly one attempt.
    pub const NONE: Self = Self {
        max_retries: 0,
        backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        exponential: false,
    };

    /// Derives the schedule of one fetcher.
    ///
    /// An explicit `retry` block wins. Without one, the `retry` error strategy
    /// honours `error.maxRetries` with a fixed [`DEFAULT_BACKOFF_MS`] delay.
    pub fn for_fetcher(retry: Option<&RetryConfig>, error: &ErrorConfig) -> Self {
        match (retry, error.strategy, error.max_retries) {
            (Some(retry), _, _) => Self {
                max_retries: retry.max_retries,
                backoff: Duration::from_millis(retry.backoff_ms),
                exponential: retry.exponential,
            },
            (None, ErrorStrategy::Retry, Some(max_retries)) => Self {
                max_retries,
                ..Self::NONE
            },
            _ => Self::NONE,
        }
    }

    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-indexed: the first retry is 0).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.exponential {
            return self.backoff;
        }
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

// ---------------------------------------------------------------------------
// Unit failure
// ---------------------------------------------------------------------------

/// Terminal outcome of a failed unit.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Surface the error to the caller.
    Propagate,
    /// Non-successful result with `null` data.
    Skip,
    /// Successful result carrying this value.
    Substitute(Value),
}

impl ErrorConfig {
    /// Resolves the configured strategy once retries are exhausted.
    pub fn on_failure(&self) -> FailureOutcome {
        match self.strategy {
            ErrorStrategy::Throw => FailureOutcome::Propagate,
            ErrorStrategy::Skip | ErrorStrategy::Retry => FailureOutcome::Skip,
            ErrorStrategy::Default => {
                FailureOutcome::Substitute(self.default_value.clone().unwrap_or(Value::Null))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate failure
// ---------------------------------------------------------------------------

/// Final decision for an aggregate that has finished post-processing.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// Raise the first collected error.
    Raise(FetchError),
    /// Return a result with this data.
    Return(Value),
}

/// Applies the aggregate-level failure policy.
///
/// Without a policy, the first error is raised only when errors were collected
/// and no usable data resulted. With one, `throw` raises whenever errors
/// exist, `default` substitutes its value for empty data, and `skip`/`retry`
/// always return.
pub fn settle_aggregate(
    data: Value,
    errors: &[FetchError],
    policy: Option<&ErrorConfig>,
) -> AggregateOutcome {
    let Some(first) = errors.first() else {
        return AggregateOutcome::Return(data);
    };
    match policy.map(|p| p.strategy) {
        None if is_empty_data(&data) => AggregateOutcome::Raise(first.clone()),
        Some(ErrorStrategy::Throw) => AggregateOutcome::Raise(first.clone()),
        Some(ErrorStrategy::Default) if is_empty_data(&data) => AggregateOutcome::Return(
            policy
                .and_then(|p| p.default_value.clone())
                .unwrap_or(Value::Null),
        ),
        _ => AggregateOutcome::Return(data),
    }
}
