//! # Transaction Retry
//!
//! SQLite serialises writers. A deferred transaction that read a snapshot and
//! then tries to write after another writer committed fails with
//! `SQLITE_BUSY_SNAPSHOT`; a writer that waited past `busy_timeout` fails with
//! `SQLITE_BUSY`. Neither committed anything, so the whole unit of work is
//! simply run again.
//!
//! ```text
//!   attempt 1 ── BEGIN … UPDATE … ✗ Busy ── rollback ── sleep 1×backoff
//!   attempt 2 ── BEGIN … UPDATE … ✗ Busy ── rollback ── sleep 2×backoff
//!   attempt 3 ── BEGIN … UPDATE … COMMIT ✓
//! ```
//!
//! Only [`DbError::is_retryable`] errors are retried. A rule violation such as
//! `InsufficientStock` is final on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{DbError, DbResult};

/// Retry and allocation limits for write transactions.
#[derive(Debug, Clone, Copy)]
pub struct TxPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Sleep before retry n is `n × backoff`.
    pub backoff: Duration,
    /// Draws before giving up on finding a free pickup code.
    pub pickup_code_attempts: u32,
}

impl Default for TxPolicy {
    fn default() -> Self {
        TxPolicy {
            max_retries: 5,
            backoff: Duration::from_millis(10),
            pickup_code_attempts: 20,
        }
    }
}

/// Runs `unit` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
pub(crate) async fn retry_transaction<T, F, Fut>(
    policy: &TxPolicy,
    operation: &'static str,
    mut unit: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match unit().await {
            Err(err) if err.is_retryable() => {
                if attempt >= policy.max_retries {
                    return Err(DbError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: err.to_string(),
                    });
                }
                attempt += 1;
                warn!(operation, attempt, error = %err, "Write conflict, retrying transaction");
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            other => return other,
        }
    }
}
