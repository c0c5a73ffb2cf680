// ABOUTME: Talk identity database operations
// ABOUTME: Lazily creates and resolves stable talk ids for 1:1 pairs and groups

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Talk, TalkMode};

impl Database {
    /// Create the talks table and its identity index
    pub(super) async fn migrate_talks(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS talks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                talk_mode INTEGER NOT NULL,
                user_min_id INTEGER NOT NULL DEFAULT 0,
                user_max_id INTEGER NOT NULL DEFAULT 0,
                group_id INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create talks table: {e}")))?;

        // The identity key concurrent first-contact sends converge on
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_talks_identity
             ON talks(talk_mode, user_min_id, user_max_id, group_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create talks identity index: {e}")))?;

        Ok(())
    }

    /// Find or create the talk for a 1:1 user pair
    ///
    /// The pair is normalized to (min, max) so both orderings resolve to the
    /// same row. Runs on the caller's transaction connection so the id is
    /// visible to later statements in that transaction. Idempotent - losers
    /// of a creation race converge on the winner's row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or lookup fails
    pub async fn find_or_create_single_talk(
        &self,
        conn: &mut SqliteConnection,
        uid_a: i64,
        uid_b: i64,
    ) -> AppResult<i64> {
        let (user_min_id, user_max_id) = Talk::normalize_pair(uid_a, uid_b);
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO talks (talk_mode, user_min_id, user_max_id, group_id, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $4)
            ON CONFLICT(talk_mode, user_min_id, user_max_id, group_id) DO NOTHING
            ",
        )
        .bind(TalkMode::Single.code())
        .bind(user_min_id)
        .bind(user_max_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create single talk: {e}")))?;

        let row = sqlx::query(
            r"
            SELECT id FROM talks
            WHERE talk_mode = $1 AND user_min_id = $2 AND user_max_id = $3 AND group_id = 0
            ",
        )
        .bind(TalkMode::Single.code())
        .bind(user_min_id)
        .bind(user_max_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to resolve single talk: {e}")))?;

        Ok(row.get("id"))
    }

    /// Find or create the talk for a group
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or lookup fails
    pub async fn find_or_create_group_talk(
        &self,
        conn: &mut SqliteConnection,
        group_id: i64,
    ) -> AppResult<i64> {
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO talks (talk_mode, user_min_id, user_max_id, group_id, created_at, updated_at)
            VALUES ($1, 0, 0, $2, $3, $3)
            ON CONFLICT(talk_mode, user_min_id, user_max_id, group_id) DO NOTHING
            ",
        )
        .bind(TalkMode::Group.code())
        .bind(group_id)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create group talk: {e}")))?;

        let row = sqlx::query(
            "SELECT id FROM talks WHERE talk_mode = $1 AND group_id = $2",
        )
        .bind(TalkMode::Group.code())
        .bind(group_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to resolve group talk: {e}")))?;

        Ok(row.get("id"))
    }

    /// Look up the talk id for a 1:1 pair without creating it
    ///
    /// Absence is `Ok(None)`, never an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_single_talk_id(&self, uid_a: i64, uid_b: i64) -> AppResult<Option<i64>> {
        let (user_min_id, user_max_id) = Talk::normalize_pair(uid_a, uid_b);

        let row = sqlx::query(
            r"
            SELECT id FROM talks
            WHERE talk_mode = $1 AND user_min_id = $2 AND user_max_id = $3 AND group_id = 0
            ",
        )
        .bind(TalkMode::Single.code())
        .bind(user_min_id)
        .bind(user_max_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up single talk: {e}")))?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Look up the talk id for a group without creating it
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_group_talk_id(&self, group_id: i64) -> AppResult<Option<i64>> {
        let row = sqlx::query("SELECT id FROM talks WHERE talk_mode = $1 AND group_id = $2")
            .bind(TalkMode::Group.code())
            .bind(group_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to look up group talk: {e}")))?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Fetch a talk row by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_talk(&self, talk_id: i64) -> AppResult<Option<Talk>> {
        let row = sqlx::query(
            r"
            SELECT id, talk_mode, user_min_id, user_max_id, group_id, created_at, updated_at
            FROM talks WHERE id = $1
            ",
        )
        .bind(talk_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get talk: {e}")))?;

        row.map(|r| {
            Ok(Talk {
                id: r.get("id"),
                talk_mode: TalkMode::from_code(r.get("talk_mode"))?,
                user_min_id: r.get("user_min_id"),
                user_max_id: r.get("user_max_id"),
                group_id: r.get("group_id"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }
}
