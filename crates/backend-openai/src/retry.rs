//! Retry with exponential back-off and jitter for completion calls.

use std::future::Future;
use std::time::Duration;

use brandlens_extract::CompletionError;

const MAX_DELAY_MS: u64 = 8_000;

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors (see [`CompletionError::is_retriable`]).
///
/// Attempt `n` sleeps `backoff_base_ms × 2ⁿ⁻¹ ± 25 %` before retrying,
/// capped at 8 s. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, CompletionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt, rand::random::<f64>());
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Transient completion error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Delay before retry `attempt` (1-based), with `unit` in `[0, 1)` as jitter.
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32, unit: f64) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (unit * 0.5 + 0.75)) as u64;
    jittered.min(MAX_DELAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay_ms(500, 1, 0.5), 500);
        assert_eq!(backoff_delay_ms(500, 2, 0.5), 1_000);
        assert_eq!(backoff_delay_ms(500, 3, 0.0), 1_500);
        assert_eq!(backoff_delay_ms(500, 20, 0.99), MAX_DELAY_MS);
        assert_eq!(backoff_delay_ms(0, 5, 0.5), 0);
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CompletionError>("Acme")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "Acme");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CompletionError::Http {
                        status: 503,
                        body: String::new(),
                    })
                } else {
                    Ok("Acme")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "Acme");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CompletionError::Timeout)
            }
        })
        .await;
        assert!(matches!(result, Err(CompletionError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(CompletionError::Http {
                    status: 401,
                    body: "invalid api key".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(CompletionError::Http { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
