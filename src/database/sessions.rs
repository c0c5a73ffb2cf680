// ABOUTME: Talk session database operations for the denormalized per-user inbox rows
// ABOUTME: Handles unread bumps, last-message snapshots, flags, drafts, and soft deletion

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    MessageType, NewTalkSession, SessionBump, SessionLastMessage, TalkMode, TalkSession,
};

/// Map one session row into the model type
fn map_session_row(row: &SqliteRow) -> AppResult<TalkSession> {
    Ok(TalkSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        talk_id: row.get("talk_id"),
        talk_mode: TalkMode::from_code(row.get("talk_mode"))?,
        to_from_id: row.get("to_from_id"),
        is_top: row.get("is_top"),
        is_disturb: row.get("is_disturb"),
        is_robot: row.get("is_robot"),
        last_ack_seq: row.get("last_ack_seq"),
        unread_num: row.get("unread_num"),
        last_msg_id: row.get("last_msg_id"),
        last_msg_type: row
            .get::<Option<i64>, _>("last_msg_type")
            .map(MessageType::from_code)
            .transpose()?,
        last_sender_id: row.get("last_sender_id"),
        last_msg_digest: row.get("last_msg_digest"),
        draft_text: row.get("draft_text"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        remark: row.get("remark"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const SESSION_COLUMNS: &str = "id, user_id, talk_id, talk_mode, to_from_id, is_top, \
     is_disturb, is_robot, last_ack_seq, unread_num, last_msg_id, last_msg_type, \
     last_sender_id, last_msg_digest, draft_text, name, avatar, remark, deleted_at, \
     created_at, updated_at";

impl Database {
    /// Create the talk sessions table and its indexes
    pub(super) async fn migrate_sessions(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS talk_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                talk_id INTEGER NOT NULL,
                talk_mode INTEGER NOT NULL,
                to_from_id INTEGER NOT NULL,
                is_top INTEGER NOT NULL DEFAULT 0,
                is_disturb INTEGER NOT NULL DEFAULT 0,
                is_robot INTEGER NOT NULL DEFAULT 0,
                last_ack_seq INTEGER NOT NULL DEFAULT 0,
                unread_num INTEGER NOT NULL DEFAULT 0,
                last_msg_id TEXT,
                last_msg_type INTEGER,
                last_sender_id INTEGER,
                last_msg_digest TEXT,
                draft_text TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                avatar TEXT NOT NULL DEFAULT '',
                remark TEXT NOT NULL DEFAULT '',
                deleted_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create talk_sessions table: {e}")))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_talk_sessions_user_talk
             ON talk_sessions(user_id, talk_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create session key index: {e}")))?;

        // Message bumps fan out across all rows of one talk
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_talk_sessions_talk ON talk_sessions(talk_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create session talk index: {e}")))?;

        Ok(())
    }

    /// Apply a new message to every recipient inbox row of a talk
    ///
    /// One UPDATE: refreshes the last-message snapshot and increments the
    /// unread counter on every live session row of the talk except the
    /// sender's own. Soft-deleted rows are never resurrected. Returns the
    /// number of rows bumped.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn bump_sessions_on_message(
        &self,
        conn: &mut SqliteConnection,
        bump: &SessionBump,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET unread_num = unread_num + 1,
                last_msg_id = $1,
                last_msg_type = $2,
                last_sender_id = $3,
                last_msg_digest = $4,
                updated_at = $5
            WHERE talk_id = $6 AND user_id != $3 AND deleted_at IS NULL
            ",
        )
        .bind(&bump.last_msg_id)
        .bind(bump.last_msg_type.code())
        .bind(bump.sender_id)
        .bind(&bump.digest)
        .bind(Utc::now())
        .bind(bump.talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to bump sessions: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Replace or clear one live session row's last-message snapshot
    ///
    /// `None` explicitly clears all four snapshot fields - the state of a
    /// talk whose visible history is empty. Returns whether a row changed
    /// so callers can skip a redundant downstream push.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn update_session_last_message(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        talk_id: i64,
        last: Option<&SessionLastMessage>,
    ) -> AppResult<bool> {
        let now = Utc::now();

        let result = match last {
            Some(last) => sqlx::query(
                r"
                UPDATE talk_sessions
                SET last_msg_id = $1,
                    last_msg_type = $2,
                    last_sender_id = $3,
                    last_msg_digest = $4,
                    updated_at = $5
                WHERE user_id = $6 AND talk_id = $7 AND deleted_at IS NULL
                ",
            )
            .bind(&last.msg_id)
            .bind(last.msg_type.code())
            .bind(last.sender_id)
            .bind(&last.digest)
            .bind(now)
            .bind(user_id)
            .bind(talk_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to update session snapshot: {e}")))?,
            None => sqlx::query(
                r"
                UPDATE talk_sessions
                SET last_msg_id = NULL,
                    last_msg_type = NULL,
                    last_sender_id = NULL,
                    last_msg_digest = NULL,
                    updated_at = $1
                WHERE user_id = $2 AND talk_id = $3 AND deleted_at IS NULL
                ",
            )
            .bind(now)
            .bind(user_id)
            .bind(talk_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to clear session snapshot: {e}")))?,
        };

        Ok(result.rows_affected() > 0)
    }

    /// Users whose live session row still points at the given message
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_session_users_by_last_msg(
        &self,
        talk_id: i64,
        msg_id: &str,
    ) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            r"
            SELECT user_id FROM talk_sessions
            WHERE talk_id = $1 AND last_msg_id = $2 AND deleted_at IS NULL
            ",
        )
        .bind(talk_id)
        .bind(msg_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list sessions by last msg: {e}")))?;

        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    /// Users holding a live session row for a talk
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_session_users(&self, talk_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT user_id FROM talk_sessions WHERE talk_id = $1 AND deleted_at IS NULL",
        )
        .bind(talk_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list session users: {e}")))?;

        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    /// Create a session row, or re-activate and re-snapshot an existing one
    ///
    /// Idempotent on (user, talk). Recreating a soft-deleted row clears
    /// `deleted_at` and re-applies the profile snapshot; unread count,
    /// flags, draft, and the last-message snapshot stay untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails
    pub async fn upsert_session(
        &self,
        conn: &mut SqliteConnection,
        session: &NewTalkSession,
    ) -> AppResult<TalkSession> {
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r"
            INSERT INTO talk_sessions (
                user_id, talk_id, talk_mode, to_from_id, is_robot,
                name, avatar, remark, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT(user_id, talk_id) DO UPDATE SET
                talk_mode = excluded.talk_mode,
                to_from_id = excluded.to_from_id,
                is_robot = excluded.is_robot,
                name = excluded.name,
                avatar = excluded.avatar,
                remark = excluded.remark,
                deleted_at = NULL,
                updated_at = excluded.updated_at
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(session.user_id)
        .bind(session.talk_id)
        .bind(session.talk_mode.code())
        .bind(session.to_from_id)
        .bind(session.is_robot)
        .bind(&session.name)
        .bind(&session.avatar)
        .bind(&session.remark)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert session: {e}")))?;

        map_session_row(&row)
    }

    /// Fetch one session row by its (user, talk) key, deleted or not
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_session(&self, user_id: i64, talk_id: i64) -> AppResult<Option<TalkSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM talk_sessions WHERE user_id = $1 AND talk_id = $2"
        ))
        .bind(user_id)
        .bind(talk_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get session: {e}")))?;

        row.as_ref().map(map_session_row).transpose()
    }

    /// Fetch one session row by its counterpart target, deleted or not
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_session_by_target(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
    ) -> AppResult<Option<TalkSession>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM talk_sessions
            WHERE user_id = $1 AND to_from_id = $2 AND talk_mode = $3
            "
        ))
        .bind(user_id)
        .bind(to_from_id)
        .bind(mode.code())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get session by target: {e}")))?;

        row.as_ref().map(map_session_row).transpose()
    }

    /// A user's live session list: pinned rows first, then latest activity
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_sessions(&self, user_id: i64) -> AppResult<Vec<TalkSession>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM talk_sessions
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY is_top DESC, updated_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list sessions: {e}")))?;

        rows.iter().map(map_session_row).collect()
    }

    /// Zero the unread counter and advance the read checkpoint
    ///
    /// `last_ack_seq` only moves forward; a stale caller cannot regress it.
    /// Returns whether a live row was updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn clear_session_unread(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        talk_id: i64,
        last_ack_seq: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET unread_num = 0,
                last_ack_seq = MAX(last_ack_seq, $1),
                updated_at = $2
            WHERE user_id = $3 AND talk_id = $4 AND deleted_at IS NULL
            ",
        )
        .bind(last_ack_seq)
        .bind(Utc::now())
        .bind(user_id)
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to clear session unread: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Pin or unpin a live session; returns whether a row matched
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_session_top(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        is_top: bool,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET is_top = $1, updated_at = $2
            WHERE user_id = $3 AND to_from_id = $4 AND talk_mode = $5 AND deleted_at IS NULL
            ",
        )
        .bind(is_top)
        .bind(Utc::now())
        .bind(user_id)
        .bind(to_from_id)
        .bind(mode.code())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to set session top: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mute or unmute a live session; returns whether a row matched
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_session_disturb(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        is_disturb: bool,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET is_disturb = $1, updated_at = $2
            WHERE user_id = $3 AND to_from_id = $4 AND talk_mode = $5 AND deleted_at IS NULL
            ",
        )
        .bind(is_disturb)
        .bind(Utc::now())
        .bind(user_id)
        .bind(to_from_id)
        .bind(mode.code())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to set session disturb: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a live session; message history is not touched
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn soft_delete_session(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET deleted_at = $1, updated_at = $1
            WHERE user_id = $2 AND to_from_id = $3 AND talk_mode = $4 AND deleted_at IS NULL
            ",
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(to_from_id)
        .bind(mode.code())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to soft-delete session: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Store the unsent draft text on a live session
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_session_draft(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        draft: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET draft_text = $1, updated_at = $2
            WHERE user_id = $3 AND to_from_id = $4 AND talk_mode = $5 AND deleted_at IS NULL
            ",
        )
        .bind(draft)
        .bind(Utc::now())
        .bind(user_id)
        .bind(to_from_id)
        .bind(mode.code())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to set session draft: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Clear the snapshot and unread state of every session row of a talk
    ///
    /// Used after a whole-talk purge; deleted rows are included so nothing
    /// keeps pointing at purged messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn reset_talk_snapshots(
        &self,
        conn: &mut SqliteConnection,
        talk_id: i64,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE talk_sessions
            SET last_msg_id = NULL,
                last_msg_type = NULL,
                last_sender_id = NULL,
                last_msg_digest = NULL,
                unread_num = 0,
                updated_at = $1
            WHERE talk_id = $2
            ",
        )
        .bind(Utc::now())
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to reset talk snapshots: {e}")))?;

        Ok(result.rows_affected())
    }
}
