//! Unit of Work Pattern Implementation
//!
//! Transactional boundaries for multi-statement repository operations.
//! A [`Tx`] is committed only when the body succeeded; on error it is rolled
//! back, and on any abnormal exit the dropped transaction rolls back on its own.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::error::DbError;
use super::executor::Tx;
use crate::shared::error::{StoreError, StoreResult};

/// Attempts made by [`retry_on_deadlock`] before giving up.
pub const DEADLOCK_RETRY_ATTEMPTS: u32 = 3;

const BASE_BACKOFF_MS: u64 = 25;

/// Commit `tx` if `result` is `Ok`, roll it back otherwise.
pub async fn finish<T>(tx: Tx, result: StoreResult<T>) -> StoreResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| StoreError::wrap("failed to commit transaction", e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}

/// Whether `err` wraps a deadlock reported by the database.
pub fn is_deadlock(err: &StoreError) -> bool {
    match err {
        StoreError::Internal {
            source: Some(source),
            ..
        } => source
            .downcast_ref::<DbError>()
            .is_some_and(DbError::is_deadlock),
        _ => false,
    }
}

/// Jittered exponential backoff for the `attempt`th retry (0-based).
pub fn backoff(attempt: u32) -> Duration {
    let base = BASE_BACKOFF_MS.saturating_mul(1 << attempt.min(6));
    let jitter = rand::rng().random_range(0..=base);
    Duration::from_millis(base + jitter)
}

/// Run `op` again when it fails on a deadlock, up to
/// [`DEADLOCK_RETRY_ATTEMPTS`] times. A deadlock that survives every attempt
/// becomes a `Conflict` on `entity`.
///
/// Each invocation of `op` must open and finish its own transaction.
pub async fn retry_on_deadlock<T, F, Fut>(entity: &'static str, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if is_deadlock(&err) => {
                attempt += 1;
                if attempt >= DEADLOCK_RETRY_ATTEMPTS {
                    tracing::warn!(entity, attempts = attempt, "Giving up after repeated deadlocks");
                    return Err(StoreError::conflict(entity, "deadlock detected, retries exhausted"));
                }
                let delay = backoff(attempt - 1);
                tracing::debug!(entity, attempt, delay_ms = delay.as_millis() as u64, "Retrying after deadlock");
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::error::ErrorClass;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn deadlock() -> StoreError {
        StoreError::wrap(
            "update failed",
            DbError::Sql {
                class: ErrorClass::Deadlock,
                constraint: None,
                source: sqlx::Error::RowNotFound,
            },
        )
    }

    #[test]
    fn test_is_deadlock() {
        assert!(is_deadlock(&deadlock()));
        assert!(!is_deadlock(&StoreError::Timeout));
        assert!(!is_deadlock(&StoreError::internal("plain")));
    }

    #[test]
    fn test_backoff_grows_and_is_bounded() {
        for attempt in 0..3 {
            let base = BASE_BACKOFF_MS << attempt;
            let d = backoff(attempt).as_millis() as u64;
            assert!(d >= base && d <= base * 2, "attempt {attempt}: {d}ms");
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_deadlock() {
        let calls = AtomicU32::new(0);
        let result = retry_on_deadlock("SidebarCategory", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(deadlock())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_conflict() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = retry_on_deadlock("SidebarCategory", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(deadlock())
        })
        .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), DEADLOCK_RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = retry_on_deadlock("Job", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::not_found("Job", "j1"))
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
