//! Bounded exponential backoff for retryable remote failures.

use std::time::Duration;

use shelf_core::RetryConfig;

use crate::remote::RemoteError;

/// Delay before attempt `attempt + 1`, given that `attempt` (1-based) failed.
///
/// Doubles from `initial_backoff`, honours a larger server hint, and never
/// exceeds `max_backoff`.
pub fn delay_for(policy: &RetryConfig, attempt: u32, hint: Option<Duration>) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let exponential = policy.initial_backoff().saturating_mul(1u32 << shift);
    let wanted = match hint {
        Some(hint) => hint.max(exponential),
        None => exponential,
    };
    wanted.min(policy.max_backoff())
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. The last error is returned unchanged.
pub fn with_retry<T>(
    policy: &RetryConfig,
    label: &str,
    sleep: &mut dyn FnMut(Duration),
    mut op: impl FnMut() -> Result<T, RemoteError>,
) -> Result<T, RemoteError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = delay_for(policy, attempt, err.retry_after());
                tracing::warn!(
                    "{label}: {err}; retrying in {}ms (attempt {}/{max_attempts})",
                    delay.as_millis(),
                    attempt + 1,
                );
                sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
