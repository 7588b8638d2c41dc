//! Bounded polling

use crate::error::MigrationError;
use std::future::Future;
use std::time::Duration;

/// Poll `check` until it yields a value
///
/// Runs at most `attempts` times with `interval` between attempts. Errors
/// from `check` end polling immediately.
///
/// # Errors
/// `MigrationError::Timeout` when every attempt returned `None`.
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    attempts: u32,
    interval: Duration,
    mut check: F,
) -> Result<T, MigrationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, MigrationError>>,
{
    for attempt in 1..=attempts {
        if let Some(value) = check().await? {
            tracing::debug!(operation, attempt, "poll succeeded");
            return Ok(value);
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    tracing::warn!(operation, attempts, "poll exhausted");
    Err(MigrationError::Timeout {
        operation: operation.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_ready_value() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let value = poll_until("stack status", 5, Duration::from_millis(1), || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((n == 3).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_a_timeout() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = poll_until::<(), _, _>("drift detection", 4, Duration::from_millis(1), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, MigrationError::Timeout { attempts: 4, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn errors_stop_polling() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = poll_until::<(), _, _>("x", 10, Duration::from_millis(1), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(MigrationError::Config("bad".into()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, MigrationError::Config(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
