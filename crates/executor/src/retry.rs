//! Bounded retry of raw fetches.

use std::future::Future;
use std::time::Duration;

use pipeline::{FetchError, FetcherId, RetryPolicy};

/// Runs `attempt` until it succeeds or `policy` is exhausted.
///
/// `attempt` receives the 1-based attempt number. Each attempt is bounded by
/// `deadline` when one is given. The error of the final attempt is returned.
pub async fn run_with_retry<T, F, Fut>(
    fetcher: &FetcherId,
    policy: &RetryPolicy,
    deadline: Option<Duration>,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts();
    let mut number = 0u32;

    loop {
        number += 1;
        let result = match deadline {
            Some(limit) => tokio::time::timeout(limit, attempt(number))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::Timeout {
                        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => attempt(number).await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if number < attempts => {
                let delay = policy.delay_for(number - 1);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    fetcher = %fetcher,
                    attempt = number,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "Fetch attempt failed, will retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if policy.max_retries > 0 {
                    tracing::error!(
                        fetcher = %fetcher,
                        attempt = number,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Max retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
