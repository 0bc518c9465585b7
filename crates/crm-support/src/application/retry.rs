//! Bounded retry for transient repository failures

use std::fmt::Display;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;
use crate::ports::outbound::RepositoryError;

/// Errors that may clear up on their own
pub(crate) trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for RepositoryError {
    fn is_transient(&self) -> bool {
        RepositoryError::is_transient(self)
    }
}

/// Run `op` until it succeeds, fails permanently, runs out of attempts or
/// `cancel` fires during a backoff pause. The last error is returned.
pub(crate) async fn retry_transient<T, E, F, Fut>(
    policy: &RetryConfig,
    cancel: &CancellationToken,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() || attempt + 1 >= policy.max_attempts {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient failure, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(err),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig { max_attempts, base_delay_ms: 1, max_delay_ms: 2 }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RepositoryError> =
            retry_transient(&fast(3), &CancellationToken::new(), "load page", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(RepositoryError::ConnectionError("reset".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RepositoryError> =
            retry_transient(&fast(2), &CancellationToken::new(), "load page", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::ConnectionError("down".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_permanent_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RepositoryError> = tokio_test::block_on(retry_transient(
            &fast(5),
            &CancellationToken::new(),
            "load page",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::QueryError("bad filter".into()))
            },
        ));

        assert_eq!(result, Err(RepositoryError::QueryError("bad filter".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let slow = RetryConfig { max_attempts: 5, base_delay_ms: 60_000, max_delay_ms: 60_000 };
        let calls = AtomicU32::new(0);

        let result: Result<(), RepositoryError> = retry_transient(&slow, &cancel, "load page", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::ConnectionError("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
