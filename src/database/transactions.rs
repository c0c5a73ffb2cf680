// ABOUTME: Transaction management with an RAII guard and retry backoff for SQLite writes
// ABOUTME: Guarantees rollback on early return and absorbs transient lock contention
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! Transaction management with RAII guards and retry patterns
//!
//! This module provides:
//! - `TransactionGuard`: RAII wrapper ensuring automatic rollback if not committed
//! - `retry_transaction`: Exponential backoff for `SQLite` lock contention
//!
//! ## Example Usage
//!
//! ```text
//! async fn append_with_bump(pool: &SqlitePool) -> AppResult<()> {
//!     let tx = pool.begin().await?;
//!     let mut guard = TransactionGuard::new(tx);
//!
//!     sqlx::query("INSERT INTO messages ...").execute(guard.executor()?).await?;
//!     sqlx::query("UPDATE talk_sessions ...").execute(guard.executor()?).await?;
//!
//!     // If this line isn't reached, the transaction rolls back
//!     guard.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! Write paths that may hit lock contention under load wrap the whole
//! transaction in `retry_transaction`; non-retryable errors (constraint
//! violations, invalid data) propagate immediately.

use std::future::Future;
use std::time::Duration;

use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult};

/// Retry a transaction operation if it fails due to lock contention
///
/// Implements exponential backoff for retryable database errors -
/// "database is locked", busy handlers giving up, and timeouts. Anything
/// else is propagated on the first failure.
///
/// # Arguments
/// * `f` - Async closure that performs the full transaction
/// * `max_retries` - Maximum number of attempts (typically 3-5)
///
/// # Errors
/// Returns the last error if the operation failed after `max_retries`
/// attempts, or the first non-retryable error.
///
/// # Exponential Backoff
/// - Attempt 1: 20ms
/// - Attempt 2: 40ms
/// - Attempt 3: 80ms
pub async fn retry_transaction<F, Fut, T>(mut f: F, max_retries: u32) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts >= max_retries {
                    error!(
                        attempts = attempts,
                        max_retries = max_retries,
                        error = %e,
                        "Transaction failed after max retries"
                    );
                    return Err(e);
                }

                let error_msg = format!("{e:?}");
                if is_retryable_error(&error_msg) {
                    let backoff_ms = 10 * (1 << attempts);
                    warn!(
                        attempt = attempts,
                        max_retries = max_retries,
                        backoff_ms = backoff_ms,
                        error = %e,
                        "Transaction failed with retryable error, retrying after backoff"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                } else {
                    return Err(e);
                }
            }
        }
    }
}

/// Check if a database error is transient lock contention
///
/// Retryable: "database is locked", busy handler expiry, timeouts.
/// Non-retryable: constraint violations, invalid data, connection refusal.
fn is_retryable_error(error_msg: &str) -> bool {
    let error_lower = error_msg.to_lowercase();

    // Non-retryable: constraint violations surface as locked-adjacent text
    // in some drivers, so check these first
    if error_lower.contains("unique constraint")
        || error_lower.contains("foreign key constraint")
        || error_lower.contains("check constraint")
        || error_lower.contains("not null constraint")
    {
        return false;
    }

    if error_lower.contains("database is locked")
        || error_lower.contains("database table is locked")
        || error_lower.contains("busy")
    {
        return true;
    }

    if error_lower.contains("timeout") || error_lower.contains("timed out") {
        return true;
    }

    // Conservative default: don't retry unknown errors
    false
}

/// RAII guard for `SQLite` transactions ensuring automatic rollback on drop
///
/// Wraps a `SQLx` [`Transaction`] and provides:
/// - Automatic rollback if the guard is dropped without calling `commit()`
/// - A commit that consumes the guard (prevents double-commit)
/// - `executor()` access to the transaction's connection for queries
pub struct TransactionGuard<'c> {
    transaction: Option<Transaction<'c, Sqlite>>,
    committed: bool,
}

impl<'c> TransactionGuard<'c> {
    /// Create a new transaction guard from an open `SQLx` transaction
    #[must_use]
    pub fn new(transaction: Transaction<'c, Sqlite>) -> Self {
        debug!("TransactionGuard created - transaction will auto-rollback if not committed");
        Self {
            transaction: Some(transaction),
            committed: false,
        }
    }

    /// Commit the transaction and consume the guard
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction was already consumed or the
    /// database commit fails
    pub async fn commit(mut self) -> AppResult<()> {
        match self.transaction.take() {
            Some(tx) => {
                tx.commit()
                    .await
                    .map_err(|e| AppError::database(format!("Transaction commit failed: {e}")))?;
                self.committed = true;
                debug!("TransactionGuard committed successfully");
                Ok(())
            }
            None => Err(AppError::internal(
                "Transaction already consumed - cannot commit",
            )),
        }
    }

    /// Explicitly rollback the transaction and consume the guard
    ///
    /// Dropping the guard without committing also rolls back; this method
    /// exists for paths that want to observe rollback errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback operation fails
    pub async fn rollback(mut self) -> AppResult<()> {
        match self.transaction.take() {
            Some(tx) => {
                tx.rollback()
                    .await
                    .map_err(|e| AppError::database(format!("Transaction rollback failed: {e}")))?;
                debug!("TransactionGuard rolled back explicitly");
                Ok(())
            }
            None => Err(AppError::internal(
                "Transaction already consumed - cannot rollback",
            )),
        }
    }

    /// Check if the transaction has been committed
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    /// Get the transaction's connection for executing queries
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been committed or
    /// rolled back - a programming error in the caller.
    pub fn executor(&mut self) -> AppResult<&mut SqliteConnection> {
        self.transaction.as_deref_mut().ok_or_else(|| {
            AppError::internal("Transaction already consumed - guard used after commit/rollback")
        })
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.transaction.is_some() && !self.committed {
            // SQLx rolls the inner Transaction back on drop; log for observability
            warn!("TransactionGuard dropped without commit - transaction will be rolled back");
        }
    }
}
