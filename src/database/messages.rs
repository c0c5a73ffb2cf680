// ABOUTME: Message log database operations with mention, forward, read, and tombstone side tables
// ABOUTME: Append-only storage where revoke and status are the only mutations and purge the only delete

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Message, MessageForwardRef, MessageStatus, MessageType, RevokeStatus, TalkMode,
};

/// Map one message row into the model type
fn map_message_row(row: &SqliteRow) -> AppResult<Message> {
    Ok(Message {
        id: row.get("id"),
        talk_id: row.get("talk_id"),
        sequence: row.get("sequence"),
        talk_mode: TalkMode::from_code(row.get("talk_mode"))?,
        msg_type: MessageType::from_code(row.get("msg_type"))?,
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        extra: row.get("extra"),
        quote_msg_id: row.get("quote_msg_id"),
        is_revoked: RevokeStatus::from_code(row.get("is_revoked"))?,
        revoke_by: row.get("revoke_by"),
        revoke_time: row.get("revoke_time"),
        status: MessageStatus::from_code(row.get("status"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const MESSAGE_COLUMNS: &str = "id, talk_id, sequence, talk_mode, msg_type, sender_id, \
     receiver_id, content, extra, quote_msg_id, is_revoked, revoke_by, revoke_time, \
     status, created_at, updated_at";

/// Build a `?, ?, ...` placeholder list for a dynamic IN clause
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl Database {
    /// Create the message log and its side tables
    pub(super) async fn migrate_messages(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                talk_id INTEGER NOT NULL,
                sequence INTEGER NOT NULL,
                talk_mode INTEGER NOT NULL,
                msg_type INTEGER NOT NULL,
                sender_id INTEGER NOT NULL,
                receiver_id INTEGER NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                extra TEXT,
                quote_msg_id TEXT,
                is_revoked INTEGER NOT NULL DEFAULT 0,
                revoke_by INTEGER,
                revoke_time DATETIME,
                status INTEGER NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages table: {e}")))?;

        // Pagination runs on this; uniqueness backs the per-talk ordering contract
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_talk_sequence
             ON messages(talk_id, sequence)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message order index: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_forward_refs (
                forward_msg_id TEXT NOT NULL,
                src_msg_id TEXT NOT NULL,
                src_talk_id INTEGER NOT NULL,
                src_sender_id INTEGER NOT NULL,
                PRIMARY KEY (forward_msg_id, src_msg_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create forward refs table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_mentions (
                msg_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (msg_id, user_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create mentions table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_reads (
                msg_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                read_at DATETIME NOT NULL,
                PRIMARY KEY (msg_id, user_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create reads table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS message_user_deletes (
                msg_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                deleted_at DATETIME NOT NULL,
                PRIMARY KEY (msg_id, user_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create tombstones table: {e}")))?;

        Ok(())
    }

    /// Append a message to the log
    ///
    /// Returns `false` when a message with this client id already exists -
    /// the idempotent retry path. The caller must have allocated
    /// `message.sequence` on the same transaction connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create_message(
        &self,
        conn: &mut SqliteConnection,
        message: &Message,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO messages (
                id, talk_id, sequence, talk_mode, msg_type, sender_id, receiver_id,
                content, extra, quote_msg_id, is_revoked, revoke_by, revoke_time,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(&message.id)
        .bind(message.talk_id)
        .bind(message.sequence)
        .bind(message.talk_mode.code())
        .bind(message.msg_type.code())
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(message.extra.as_deref())
        .bind(message.quote_msg_id.as_deref())
        .bind(message.is_revoked.code())
        .bind(message.revoke_by)
        .bind(message.revoke_time)
        .bind(message.status.code())
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to create message: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    /// Fetch one message by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_message(&self, msg_id: &str) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(msg_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        row.as_ref().map(map_message_row).transpose()
    }

    /// Batch fetch messages by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_messages_by_ids(&self, msg_ids: &[String]) -> AppResult<Vec<Message>> {
        if msg_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id IN ({})",
            placeholders(msg_ids.len())
        );

        let mut query_builder = sqlx::query(&query);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id);
        }

        let rows = query_builder
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get messages by ids: {e}")))?;

        rows.iter().map(map_message_row).collect()
    }

    /// Batch fetch messages by id, as seen by one user
    ///
    /// Messages the user has tombstoned are omitted so quote and forward
    /// hydration never resurrects a personally-deleted message.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_messages_by_ids_for_user(
        &self,
        msg_ids: &[String],
        user_id: i64,
    ) -> AppResult<Vec<Message>> {
        if msg_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages m
            WHERE m.id IN ({})
              AND NOT EXISTS (
                  SELECT 1 FROM message_user_deletes d
                  WHERE d.msg_id = m.id AND d.user_id = ?
              )
            ",
            placeholders(msg_ids.len())
        );

        let mut query_builder = sqlx::query(&query);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id);
        }
        query_builder = query_builder.bind(user_id);

        let rows = query_builder
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get messages for user: {e}")))?;

        rows.iter().map(map_message_row).collect()
    }

    /// One page of talk records, newest first, as seen by one user
    ///
    /// `anchor_seq == 0` starts from the newest message; a positive anchor
    /// returns messages strictly older than it. Revoked messages and the
    /// requesting user's tombstones are always excluded; `msg_type`
    /// optionally narrows to one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_recent_messages(
        &self,
        talk_id: i64,
        anchor_seq: i64,
        limit: i64,
        user_id: i64,
        msg_type: Option<MessageType>,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages m
            WHERE m.talk_id = $1
              AND ($2 = 0 OR m.sequence < $2)
              AND m.is_revoked = 0
              AND ($3 IS NULL OR m.msg_type = $3)
              AND NOT EXISTS (
                  SELECT 1 FROM message_user_deletes d
                  WHERE d.msg_id = m.id AND d.user_id = $4
              )
            ORDER BY m.sequence DESC
            LIMIT $5
            "
        ))
        .bind(talk_id)
        .bind(anchor_seq)
        .bind(msg_type.map(|t| t.code()))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list recent messages: {e}")))?;

        rows.iter().map(map_message_row).collect()
    }

    /// Forward catch-up listing: messages with `sequence > after_seq`, ascending
    ///
    /// Unfiltered - sync consumers want the full log including revoked
    /// entries and other users' state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_messages_after(
        &self,
        talk_id: i64,
        after_seq: i64,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE talk_id = $1 AND sequence > $2
            ORDER BY sequence ASC
            LIMIT $3
            "
        ))
        .bind(talk_id)
        .bind(after_seq)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages after: {e}")))?;

        rows.iter().map(map_message_row).collect()
    }

    /// Revoke a message: compare-and-set `normal -> revoked`
    ///
    /// Returns `false` when the message was already revoked (or does not
    /// exist); the operation is a harmless no-op in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn revoke_message(
        &self,
        conn: &mut SqliteConnection,
        msg_id: &str,
        user_id: i64,
    ) -> AppResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r"
            UPDATE messages
            SET is_revoked = 1, revoke_by = $1, revoke_time = $2, updated_at = $2
            WHERE id = $3 AND is_revoked = 0
            ",
        )
        .bind(user_id)
        .bind(now)
        .bind(msg_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke message: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    /// Set the delivery status of a message
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_message_status(
        &self,
        conn: &mut SqliteConnection,
        msg_id: &str,
        status: MessageStatus,
    ) -> AppResult<()> {
        sqlx::query("UPDATE messages SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.code())
            .bind(Utc::now())
            .bind(msg_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to set message status: {e}")))?;

        Ok(())
    }

    /// Record the users mentioned by a message
    ///
    /// Write-once set semantics; duplicate pairs are ignored. Runs inside
    /// the owning message's creation transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn add_message_mentions(
        &self,
        conn: &mut SqliteConnection,
        msg_id: &str,
        user_ids: &[i64],
    ) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let values = vec!["(?, ?)"; user_ids.len()].join(", ");
        let query = format!(
            "INSERT INTO message_mentions (msg_id, user_id) VALUES {values}
             ON CONFLICT(msg_id, user_id) DO NOTHING"
        );

        let mut query_builder = sqlx::query(&query);
        for user_id in user_ids {
            query_builder = query_builder.bind(msg_id).bind(user_id);
        }

        query_builder
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to add mentions: {e}")))?;

        Ok(())
    }

    /// Record the provenance of a forward bundle
    ///
    /// Write-once; runs inside the forward message's creation transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn add_forward_refs(
        &self,
        conn: &mut SqliteConnection,
        refs: &[MessageForwardRef],
    ) -> AppResult<()> {
        if refs.is_empty() {
            return Ok(());
        }

        let values = vec!["(?, ?, ?, ?)"; refs.len()].join(", ");
        let query = format!(
            "INSERT INTO message_forward_refs
             (forward_msg_id, src_msg_id, src_talk_id, src_sender_id)
             VALUES {values}
             ON CONFLICT(forward_msg_id, src_msg_id) DO NOTHING"
        );

        let mut query_builder = sqlx::query(&query);
        for fref in refs {
            query_builder = query_builder
                .bind(&fref.forward_msg_id)
                .bind(&fref.src_msg_id)
                .bind(fref.src_talk_id)
                .bind(fref.src_sender_id);
        }

        query_builder
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to add forward refs: {e}")))?;

        Ok(())
    }

    /// Provenance rows for one forward bundle
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_forward_refs(
        &self,
        forward_msg_id: &str,
    ) -> AppResult<Vec<MessageForwardRef>> {
        let rows = sqlx::query(
            r"
            SELECT forward_msg_id, src_msg_id, src_talk_id, src_sender_id
            FROM message_forward_refs
            WHERE forward_msg_id = $1
            ORDER BY src_msg_id
            ",
        )
        .bind(forward_msg_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get forward refs: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| MessageForwardRef {
                forward_msg_id: row.get("forward_msg_id"),
                src_msg_id: row.get("src_msg_id"),
                src_talk_id: row.get("src_talk_id"),
                src_sender_id: row.get("src_sender_id"),
            })
            .collect())
    }

    /// Record a read receipt; repeat calls keep the first timestamp
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_message_read(&self, msg_id: &str, user_id: i64) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO message_reads (msg_id, user_id, read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(msg_id, user_id) DO NOTHING
            ",
        )
        .bind(msg_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to mark message read: {e}")))?;

        Ok(())
    }

    /// Bulk read receipts for a batch of messages not sent by the reader
    ///
    /// One statement for the whole batch; already-read pairs are skipped.
    /// Returns the number of receipts newly written.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_messages_read(&self, msg_ids: &[String], user_id: i64) -> AppResult<u64> {
        if msg_ids.is_empty() {
            return Ok(0);
        }

        let query = format!(
            "INSERT INTO message_reads (msg_id, user_id, read_at)
             SELECT id, ?, ? FROM messages
             WHERE sender_id != ? AND id IN ({})
             ON CONFLICT(msg_id, user_id) DO NOTHING",
            placeholders(msg_ids.len())
        );

        let mut query_builder = sqlx::query(&query)
            .bind(user_id)
            .bind(Utc::now())
            .bind(user_id);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id);
        }

        let result = query_builder
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to mark messages read: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Bulk read receipts for every message in a talk not sent by the reader
    ///
    /// Runs on the caller's transaction so the receipts commit or roll back
    /// with the rest of the acknowledgement. Returns the number of receipts
    /// newly written.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_talk_read(
        &self,
        conn: &mut SqliteConnection,
        talk_id: i64,
        user_id: i64,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO message_reads (msg_id, user_id, read_at)
            SELECT id, $1, $2 FROM messages
            WHERE talk_id = $3 AND sender_id != $1
            ON CONFLICT(msg_id, user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark talk read: {e}")))?;

        Ok(result.rows_affected())
    }

    /// When one user read one message, if ever
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_read_time(
        &self,
        msg_id: &str,
        user_id: i64,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let row =
            sqlx::query("SELECT read_at FROM message_reads WHERE msg_id = $1 AND user_id = $2")
                .bind(msg_id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| AppError::database(format!("Failed to get read time: {e}")))?;

        Ok(row.map(|r| r.get("read_at")))
    }

    /// Tombstone one message for one user; the message stays visible to others
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_message_deleted_for_user(
        &self,
        msg_id: &str,
        user_id: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO message_user_deletes (msg_id, user_id, deleted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(msg_id, user_id) DO NOTHING
            ",
        )
        .bind(msg_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to tombstone message: {e}")))?;

        Ok(())
    }

    /// Tombstone a batch of messages for one user
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_messages_deleted_for_user(
        &self,
        msg_ids: &[String],
        user_id: i64,
    ) -> AppResult<()> {
        if msg_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let values = vec!["(?, ?, ?)"; msg_ids.len()].join(", ");
        let query = format!(
            "INSERT INTO message_user_deletes (msg_id, user_id, deleted_at) VALUES {values}
             ON CONFLICT(msg_id, user_id) DO NOTHING"
        );

        let mut query_builder = sqlx::query(&query);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id).bind(user_id).bind(now);
        }

        query_builder
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to tombstone messages: {e}")))?;

        Ok(())
    }

    /// Tombstone every message of a talk for one user
    ///
    /// Runs on the caller's transaction so the tombstones commit or roll
    /// back with the rest of the clear. Returns the number of tombstones
    /// newly written.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn mark_talk_deleted_for_user(
        &self,
        conn: &mut SqliteConnection,
        talk_id: i64,
        user_id: i64,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            INSERT INTO message_user_deletes (msg_id, user_id, deleted_at)
            SELECT id, $1, $2 FROM messages
            WHERE talk_id = $3
            ON CONFLICT(msg_id, user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to tombstone talk: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Mentioned user ids for a batch of messages, keyed by message id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_mentions_for_messages(
        &self,
        msg_ids: &[String],
    ) -> AppResult<HashMap<String, Vec<i64>>> {
        if msg_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!(
            "SELECT msg_id, user_id FROM message_mentions
             WHERE msg_id IN ({})
             ORDER BY msg_id, user_id",
            placeholders(msg_ids.len())
        );

        let mut query_builder = sqlx::query(&query);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id);
        }

        let rows = query_builder
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get mentions: {e}")))?;

        let mut mentions: HashMap<String, Vec<i64>> = HashMap::new();
        for row in rows {
            mentions
                .entry(row.get("msg_id"))
                .or_default()
                .push(row.get("user_id"));
        }

        Ok(mentions)
    }

    /// How many of the given message ids live in the given talk
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_messages_in_talk(
        &self,
        talk_id: i64,
        msg_ids: &[String],
    ) -> AppResult<i64> {
        if msg_ids.is_empty() {
            return Ok(0);
        }

        let query = format!(
            "SELECT COUNT(*) as count FROM messages WHERE talk_id = ? AND id IN ({})",
            placeholders(msg_ids.len())
        );

        let mut query_builder = sqlx::query(&query).bind(talk_id);
        for msg_id in msg_ids {
            query_builder = query_builder.bind(msg_id);
        }

        let row = query_builder
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count talk messages: {e}")))?;

        Ok(row.get("count"))
    }

    /// Hard-delete every message of a talk plus all four side tables
    ///
    /// Privileged whole-talk purge. Never touches `talk_sequences`, so
    /// ordering continuity survives the purge. Returns the number of
    /// message rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the deletes fail
    pub async fn purge_talk_messages(
        &self,
        conn: &mut SqliteConnection,
        talk_id: i64,
    ) -> AppResult<u64> {
        sqlx::query(
            "DELETE FROM message_mentions
             WHERE msg_id IN (SELECT id FROM messages WHERE talk_id = $1)",
        )
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge mentions: {e}")))?;

        sqlx::query(
            "DELETE FROM message_reads
             WHERE msg_id IN (SELECT id FROM messages WHERE talk_id = $1)",
        )
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge reads: {e}")))?;

        sqlx::query(
            "DELETE FROM message_user_deletes
             WHERE msg_id IN (SELECT id FROM messages WHERE talk_id = $1)",
        )
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge tombstones: {e}")))?;

        sqlx::query(
            "DELETE FROM message_forward_refs
             WHERE forward_msg_id IN (SELECT id FROM messages WHERE talk_id = $1)",
        )
        .bind(talk_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to purge forward refs: {e}")))?;

        let result = sqlx::query("DELETE FROM messages WHERE talk_id = $1")
            .bind(talk_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to purge messages: {e}")))?;

        Ok(result.rows_affected())
    }
}
