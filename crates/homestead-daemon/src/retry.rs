// crates/homestead-daemon/src/retry.rs
//
// Exponential backoff for collaborator calls.
//
// Only transient failures (network and storage) are retried; anything else
// is returned on the first attempt. Delays double from `base_delay`.

use std::future::Future;
use std::time::Duration;

use homestead_core::HomesteadError;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

fn is_transient(err: &HomesteadError) -> bool {
    matches!(err, HomesteadError::Network(_) | HomesteadError::Storage(_))
}

/// Run `operation` up to `attempts` times, sleeping `base_delay * 2^n`
/// between attempts.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T, HomesteadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HomesteadError>>,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts && is_transient(&e) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        "Giving up: {}",
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

/// `retry_with_backoff` with the default attempt count and base delay.
pub async fn retry_default<F, Fut, T>(
    operation_name: &str,
    operation: F,
) -> Result<T, HomesteadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HomesteadError>>,
{
    retry_with_backoff(operation_name, DEFAULT_ATTEMPTS, DEFAULT_BASE_DELAY, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_recovers_from_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff("flaky", 3, Duration::from_millis(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(HomesteadError::Network("reset".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let operation = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HomesteadError::Network("refused".to_string()))
        };
        let result: Result<(), _> =
            retry_with_backoff("down", 3, Duration::from_millis(1), operation).await;
        assert!(matches!(result, Err(HomesteadError::Network(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let operation = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HomesteadError::InvalidInput("nope".to_string()))
        };
        let result: Result<(), _> =
            retry_with_backoff("bad", 3, Duration::from_millis(1), operation).await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
