// ABOUTME: Per-talk sequence allocation database operations
// ABOUTME: Hands out strictly increasing order keys inside the caller's transaction

use sqlx::{Row, SqliteConnection};

use super::Database;
use crate::errors::{AppError, AppResult};

impl Database {
    /// Create the sequence allocator table
    pub(super) async fn migrate_sequences(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS talk_sequences (
                talk_id INTEGER PRIMARY KEY,
                last_seq INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create talk_sequences table: {e}")))?;

        Ok(())
    }

    /// Allocate the next sequence number for a talk
    ///
    /// Runs a single upsert on the caller's transaction connection: the
    /// first allocation for a talk yields 1, every later one `last + 1`.
    /// The row lock taken here is the per-talk serialization point; the
    /// allocated value is only durable once the caller's transaction
    /// commits, and a rollback returns it to the allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails
    pub async fn next_sequence(
        &self,
        conn: &mut SqliteConnection,
        talk_id: i64,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            INSERT INTO talk_sequences (talk_id, last_seq)
            VALUES ($1, 1)
            ON CONFLICT(talk_id) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            ",
        )
        .bind(talk_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to allocate sequence: {e}")))?;

        Ok(row.get("last_seq"))
    }

    /// Committed sequence high-water mark for a talk (0 if none allocated)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn current_sequence(&self, talk_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT last_seq FROM talk_sequences WHERE talk_id = $1")
            .bind(talk_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to read sequence: {e}")))?;

        Ok(row.map_or(0, |r| r.get("last_seq")))
    }
}
