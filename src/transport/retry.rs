//! Per-attempt timeout and exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

use super::CallOptions;
use crate::error::TransportError;

/// Wait before retry number `attempt` (0-based): `base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Run `attempt` until it succeeds or the retry budget is exhausted
///
/// Each attempt is aborted after `options.timeout` and counted as a failure.
/// The closure receives the 0-based attempt index.
pub async fn with_backoff<T, F, Fut>(
    options: &CallOptions,
    label: &str,
    mut attempt: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut index = 0u32;
    loop {
        let outcome = match timeout(options.timeout, attempt(index)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                after_ms: options.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if index < options.max_retries => {
                let delay = backoff_delay(options.backoff_base, index);
                debug!(
                    "⏳ {} attempt #{} failed ({}), retrying in {}ms",
                    label,
                    index + 1,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                index += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
        // Never panics on absurd attempt counts
        assert!(backoff_delay(base, 64) >= backoff_delay(base, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let options = CallOptions::new(Duration::from_millis(5000), 1);
        let attempts = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&attempts);
        let result = with_backoff(&options, "/health", move |index| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if index == 0 {
                    // Hangs past the timeout
                    sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, TransportError>(index)
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5500));
        assert!(elapsed < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let options = CallOptions::new(Duration::from_millis(100), 2);
        let attempts = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&attempts);
        let result: Result<(), _> = with_backoff(&options, "/audio/status", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::Status { status: 503 }) }
        })
        .await;

        assert_eq!(result, Err(TransportError::Status { status: 503 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_probe() {
        let options = CallOptions::probe(Duration::from_millis(100));
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        let result: Result<(), _> = with_backoff(&options, "/health", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::Request("connection refused".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
