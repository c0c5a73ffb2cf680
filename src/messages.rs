// ABOUTME: Message lifecycle orchestrator for the Confab engine
// ABOUTME: Coordinates sequencing, side tables, inbox bumps, and best-effort push
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Message Manager
//!
//! [`MessageManager`] drives the write path for messages: it validates the
//! request, allocates the per-talk sequence, appends the log row together
//! with its mention/forward side tables, bumps every counterpart inbox row,
//! and only after the transaction commits pushes the event to the talk.
//!
//! All multi-step writes run inside a
//! [`TransactionGuard`](crate::database::transactions::TransactionGuard) so
//! an early return rolls back the whole operation. Push delivery is
//! fire-and-forget: bounded by a timeout, logged on failure, never able to
//! undo a commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constants::{events, limits, timeouts};
use crate::database::transactions::retry_transaction;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Message, MessageForwardRef, MessageStatus, MessageType, MessageView, QuotePreview,
    RecordsPage, RevokeStatus, SendMessageParams, SessionBump, SessionLastMessage, TalkMode,
    REVOKED_DIGEST,
};
use crate::notifications::Notifier;
use crate::profiles::UserDirectory;

/// Result of the transactional core of a send
enum SendOutcome {
    /// The message was appended with a fresh sequence
    Created(Message),
    /// The client id already exists; the stored row wins
    Duplicate,
}

/// Orchestrator for the message lifecycle
///
/// Cheap to clone indirectly: construct once and share behind an `Arc`, or
/// construct per request from the same `Database` handle.
pub struct MessageManager {
    database: Database,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn UserDirectory>,
    push_enabled: bool,
    push_timeout: Duration,
}

impl MessageManager {
    /// Create a manager from shared infrastructure handles
    #[must_use]
    pub fn new(
        database: Database,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn UserDirectory>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            database,
            notifier,
            directory,
            push_enabled: config.push.enabled,
            push_timeout: Duration::from_millis(config.push.timeout_ms),
        }
    }

    /// Append a message to a talk and fan it out
    ///
    /// The talk must already exist; creating talks is the talk orchestrator's
    /// job. Retrying with the same `client_msg_id` is idempotent: the stored
    /// message is returned and no second inbox bump or push happens.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input or unresolvable forward
    /// sources, a not-found error when the talk does not exist, and a database
    /// error if the write fails after retries.
    pub async fn send_message(&self, params: &SendMessageParams) -> AppResult<MessageView> {
        validate_send(params)?;

        let talk_id = self.resolve_talk_id(params).await?;
        let forward_refs = self.resolve_forward_refs(params).await?;

        // The write path contends on the per-talk allocator row; retry
        // absorbs transient lock errors without re-running validation.
        let outcome = retry_transaction(
            || self.append_message_tx(talk_id, params, &forward_refs),
            timeouts::SEND_WRITE_MAX_RETRIES,
        )
        .await?;

        match outcome {
            SendOutcome::Created(message) => {
                let view = self.hydrate_one(params.sender_id, &message).await?;
                let payload = serde_json::to_value(&view)?;
                self.push_talk_event(
                    params.talk_mode,
                    params.receiver_id,
                    params.sender_id,
                    events::IM_MESSAGE,
                    payload,
                )
                .await;
                Ok(view)
            }
            SendOutcome::Duplicate => {
                debug!(
                    "Duplicate client msg id {}, returning stored message",
                    params.client_msg_id
                );
                let message = self
                    .database
                    .get_message(&params.client_msg_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::internal("Duplicate message disappeared during send")
                    })?;
                self.hydrate_one(params.sender_id, &message).await
            }
        }
    }

    /// Load a page of recent messages, newest first
    ///
    /// Convenience wrapper over [`Self::load_history_records`] without a kind
    /// filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive ids or a negative anchor
    pub async fn load_records(
        &self,
        user_id: i64,
        talk_id: i64,
        anchor_seq: i64,
        limit: i64,
    ) -> AppResult<RecordsPage> {
        self.load_history_records(user_id, talk_id, anchor_seq, limit, None)
            .await
    }

    /// Load a page of recent messages, optionally filtered by kind
    ///
    /// Pages walk backwards from `anchor_seq` (0 = newest). Revoked messages
    /// and messages the user deleted are excluded; `next_anchor_seq` is 0 once
    /// the talk is exhausted, otherwise the oldest sequence on the page.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive ids or a negative anchor
    pub async fn load_history_records(
        &self,
        user_id: i64,
        talk_id: i64,
        anchor_seq: i64,
        limit: i64,
        msg_type: Option<MessageType>,
    ) -> AppResult<RecordsPage> {
        if user_id <= 0 || talk_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and talk_id must be positive",
            ));
        }
        if anchor_seq < 0 {
            return Err(AppError::invalid_input("anchor_seq must not be negative"));
        }

        let limit = clamp_records_limit(limit);
        let messages = self
            .database
            .list_recent_messages(talk_id, anchor_seq, limit, user_id, msg_type)
            .await?;

        // LIMIT applies after the visibility filters, so a short page means
        // the talk is exhausted rather than hidden rows were skipped.
        let next_anchor_seq = if messages.len() < limit as usize {
            0
        } else {
            messages.last().map_or(0, |m| m.sequence)
        };

        let items = self.hydrate_batch(user_id, &messages).await?;
        Ok(RecordsPage {
            items,
            next_anchor_seq,
        })
    }

    /// Hide messages from one user's view
    ///
    /// Writes per-user tombstones; other participants keep seeing the
    /// messages. If the user's inbox row pointed at a deleted message, the
    /// snapshot is recomputed from the latest still-visible message. The
    /// snapshot repair is best-effort: once the tombstones commit they
    /// stand, and a repair failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the batch is empty, oversized, or
    /// contains ids outside the talk
    pub async fn delete_messages(
        &self,
        user_id: i64,
        talk_id: i64,
        msg_ids: &[String],
    ) -> AppResult<()> {
        let msg_ids = validate_id_batch(user_id, talk_id, msg_ids)?;
        self.ensure_messages_in_talk(talk_id, &msg_ids).await?;

        self.database
            .mark_messages_deleted_for_user(&msg_ids, user_id)
            .await?;

        // Other devices of the same user drop the messages from view
        let payload = json!({ "talk_id": talk_id, "msg_ids": msg_ids });
        self.push_user_event(user_id, events::IM_MESSAGE_DELETE, payload)
            .await;

        if let Err(e) = self
            .repair_session_after_delete(user_id, talk_id, &msg_ids)
            .await
        {
            warn!("Failed to repair the inbox snapshot for user {user_id} after delete: {e}");
        }
        Ok(())
    }

    /// Hide every message in a talk from one user's view
    ///
    /// Tombstones the whole log for the user, clears their inbox snapshot,
    /// and zeroes the unread badge with the ack advanced to the current
    /// high-water mark. All of it is one transaction: either the talk is
    /// fully cleared for the user or nothing changed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive ids or a database error
    pub async fn clear_talk_records(&self, user_id: i64, talk_id: i64) -> AppResult<()> {
        if user_id <= 0 || talk_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and talk_id must be positive",
            ));
        }

        let high_water = self.database.current_sequence(talk_id).await?;

        let mut guard = self.database.begin_guard().await?;
        let tombstoned = self
            .database
            .mark_talk_deleted_for_user(guard.executor()?, talk_id, user_id)
            .await?;
        self.database
            .update_session_last_message(guard.executor()?, user_id, talk_id, None)
            .await?;
        self.database
            .clear_session_unread(guard.executor()?, user_id, talk_id, high_water)
            .await?;
        guard.commit().await?;

        debug!("Cleared {tombstoned} messages in talk {talk_id} for user {user_id}");
        Ok(())
    }

    /// Hard-delete a talk's entire message log
    ///
    /// Privileged operation for group dissolution and retention enforcement;
    /// authorization is the caller's concern. Removes the log and all side
    /// tables in one transaction and resets every session snapshot. The
    /// sequence allocator is left untouched so future appends stay above
    /// every sequence ever handed out.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive talk id or a database
    /// error if the purge fails
    pub async fn purge_talk_records(&self, talk_id: i64) -> AppResult<u64> {
        if talk_id <= 0 {
            return Err(AppError::invalid_input("talk_id must be positive"));
        }

        let mut guard = self.database.begin_guard().await?;
        let purged = self
            .database
            .purge_talk_messages(guard.executor()?, talk_id)
            .await?;
        self.database
            .reset_talk_snapshots(guard.executor()?, talk_id)
            .await?;
        guard.commit().await?;

        info!("Purged {purged} messages from talk {talk_id}");
        Ok(purged)
    }

    /// Revoke a previously sent message
    ///
    /// Only the original sender may revoke. The flip is compare-and-set, so
    /// a concurrent or repeated revoke degrades to a no-op success. Once the
    /// revoke commits it is final: the digest repair on inbox rows and the
    /// revoke push are both best-effort and never fail the operation.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown message and a permission
    /// error when the caller is not the sender
    pub async fn revoke_message(&self, user_id: i64, msg_id: &str) -> AppResult<()> {
        let message = self
            .database
            .get_message(msg_id)
            .await?
            .ok_or_else(|| AppError::not_found("message"))?;
        if message.sender_id != user_id {
            return Err(AppError::permission_denied(
                "Only the sender can revoke a message",
            ));
        }

        let mut guard = self.database.begin_guard().await?;
        let changed = self
            .database
            .revoke_message(guard.executor()?, msg_id, user_id)
            .await?;
        guard.commit().await?;

        if !changed {
            debug!("Message {msg_id} was already revoked");
            return Ok(());
        }

        if let Err(e) = self.repair_sessions_after_revoke(&message).await {
            warn!("Failed to repair inbox digests after revoking {msg_id}: {e}");
        }

        let payload = json!({
            "talk_id": message.talk_id,
            "msg_id": message.id,
            "revoke_by": user_id,
        });
        self.push_talk_event(
            message.talk_mode,
            message.receiver_id,
            message.sender_id,
            events::IM_MESSAGE_REVOKE,
            payload,
        )
        .await;

        Ok(())
    }

    /// Transition a message's delivery status
    ///
    /// # Errors
    ///
    /// Returns a not-found error when the message does not exist
    pub async fn update_message_status(
        &self,
        msg_id: &str,
        status: MessageStatus,
    ) -> AppResult<()> {
        if self.database.get_message(msg_id).await?.is_none() {
            return Err(AppError::not_found("message"));
        }

        let mut conn = self
            .database
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        self.database
            .set_message_status(&mut conn, msg_id, status)
            .await
    }

    /// Record read receipts for a batch of messages
    ///
    /// Receipts are first-read-wins, so re-reading is harmless, and the
    /// reader's own messages are skipped. A read event is pushed to the
    /// talk so senders can render checkmarks.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the batch is empty, oversized, or
    /// contains ids outside the talk, and a not-found error for an unknown
    /// talk
    pub async fn mark_read(
        &self,
        user_id: i64,
        talk_id: i64,
        msg_ids: &[String],
    ) -> AppResult<()> {
        let msg_ids = validate_id_batch(user_id, talk_id, msg_ids)?;

        let talk = self
            .database
            .get_talk(talk_id)
            .await?
            .ok_or_else(|| AppError::not_found("talk"))?;
        self.ensure_messages_in_talk(talk_id, &msg_ids).await?;

        self.database.mark_messages_read(&msg_ids, user_id).await?;

        let to_from_id = match talk.talk_mode {
            TalkMode::Single => {
                if talk.user_min_id == user_id {
                    talk.user_max_id
                } else {
                    talk.user_min_id
                }
            }
            TalkMode::Group => talk.group_id,
        };
        let payload = json!({
            "talk_id": talk_id,
            "msg_ids": msg_ids,
            "user_id": user_id,
        });
        self.push_talk_event(
            talk.talk_mode,
            to_from_id,
            user_id,
            events::IM_MESSAGE_READ,
            payload,
        )
        .await;

        Ok(())
    }

    /// Transactional core of a send
    ///
    /// Runs on a single connection so the sequence row lock, the log insert,
    /// the side tables, and the inbox bump commit or roll back together.
    async fn append_message_tx(
        &self,
        talk_id: i64,
        params: &SendMessageParams,
        forward_refs: &[MessageForwardRef],
    ) -> AppResult<SendOutcome> {
        let mut guard = self.database.begin_guard().await?;

        let sequence = self
            .database
            .next_sequence(guard.executor()?, talk_id)
            .await?;

        let now = Utc::now();
        let message = Message {
            id: params.client_msg_id.clone(),
            talk_id,
            sequence,
            talk_mode: params.talk_mode,
            msg_type: params.msg_type,
            sender_id: params.sender_id,
            receiver_id: params.receiver_id,
            content: params.content.clone(),
            extra: params.extra.clone(),
            quote_msg_id: params.quote_msg_id.clone(),
            is_revoked: RevokeStatus::Normal,
            revoke_by: None,
            revoke_time: None,
            status: MessageStatus::Sent,
            created_at: now,
            updated_at: now,
        };

        let inserted = self
            .database
            .create_message(guard.executor()?, &message)
            .await?;
        if !inserted {
            // Client retry: roll back so the stored row wins and the
            // speculative sequence allocation is returned
            guard.rollback().await?;
            return Ok(SendOutcome::Duplicate);
        }

        self.database
            .add_message_mentions(guard.executor()?, &message.id, &params.mention_uids)
            .await?;
        self.database
            .add_forward_refs(guard.executor()?, forward_refs)
            .await?;

        let bump = SessionBump {
            talk_id,
            sender_id: params.sender_id,
            last_msg_id: message.id.clone(),
            last_msg_type: message.msg_type,
            digest: message.digest(),
        };
        self.database
            .bump_sessions_on_message(guard.executor()?, &bump)
            .await?;

        guard.commit().await?;
        Ok(SendOutcome::Created(message))
    }

    /// Map the send target onto an existing talk id
    async fn resolve_talk_id(&self, params: &SendMessageParams) -> AppResult<i64> {
        let talk_id = match params.talk_mode {
            TalkMode::Single => {
                self.database
                    .get_single_talk_id(params.sender_id, params.receiver_id)
                    .await?
            }
            TalkMode::Group => self.database.get_group_talk_id(params.receiver_id).await?,
        };
        talk_id.ok_or_else(|| AppError::not_found("talk"))
    }

    /// Resolve forwarded source messages into provenance rows
    ///
    /// Sources are read through the sender's view, so tombstoned messages
    /// cannot be forwarded; revoked sources are rejected outright.
    async fn resolve_forward_refs(
        &self,
        params: &SendMessageParams,
    ) -> AppResult<Vec<MessageForwardRef>> {
        if params.forward_msg_ids.is_empty() {
            return Ok(Vec::new());
        }

        let unique: HashSet<&String> = params.forward_msg_ids.iter().collect();
        let sources = self
            .database
            .get_messages_by_ids_for_user(&params.forward_msg_ids, params.sender_id)
            .await?;
        if sources.len() != unique.len() {
            return Err(AppError::invalid_input(
                "One or more forwarded messages are not visible to the sender",
            ));
        }
        if sources.iter().any(|m| m.is_revoked.is_revoked()) {
            return Err(AppError::invalid_input(
                "Revoked messages cannot be forwarded",
            ));
        }

        Ok(sources
            .iter()
            .map(|src| MessageForwardRef {
                forward_msg_id: params.client_msg_id.clone(),
                src_msg_id: src.id.clone(),
                src_talk_id: src.talk_id,
                src_sender_id: src.sender_id,
            })
            .collect())
    }

    /// Check that every id in the batch belongs to the talk
    async fn ensure_messages_in_talk(&self, talk_id: i64, msg_ids: &[String]) -> AppResult<()> {
        let owned = self
            .database
            .count_messages_in_talk(talk_id, msg_ids)
            .await?;
        if owned as usize != msg_ids.len() {
            return Err(AppError::invalid_input(
                "One or more messages do not belong to this talk",
            ));
        }
        Ok(())
    }

    /// Recompute a user's inbox snapshot after a per-user delete
    ///
    /// Only acts when the live session row pointed at one of the deleted
    /// messages; pushes a session update to that user when a row changed.
    async fn repair_session_after_delete(
        &self,
        user_id: i64,
        talk_id: i64,
        deleted: &[String],
    ) -> AppResult<()> {
        let Some(session) = self.database.get_session(user_id, talk_id).await? else {
            return Ok(());
        };
        if session.deleted_at.is_some() {
            return Ok(());
        }
        let Some(last_msg_id) = session.last_msg_id else {
            return Ok(());
        };
        if !deleted.contains(&last_msg_id) {
            return Ok(());
        }

        let latest = self
            .database
            .list_recent_messages(talk_id, 0, 1, user_id, None)
            .await?
            .into_iter()
            .next();
        let snapshot = latest.as_ref().map(SessionLastMessage::from_message);

        let mut guard = self.database.begin_guard().await?;
        let changed = self
            .database
            .update_session_last_message(guard.executor()?, user_id, talk_id, snapshot.as_ref())
            .await?;
        guard.commit().await?;

        if changed {
            let payload = session_update_payload(talk_id, snapshot.as_ref());
            self.push_user_event(user_id, events::IM_SESSION_UPDATE, payload)
                .await;
        }
        Ok(())
    }

    /// Replace stale inbox digests after a revoke
    ///
    /// Sessions keep pointing at the revoked message; only the digest flips
    /// to the recall placeholder.
    async fn repair_sessions_after_revoke(&self, message: &Message) -> AppResult<()> {
        let users = self
            .database
            .list_session_users_by_last_msg(message.talk_id, &message.id)
            .await?;
        if users.is_empty() {
            return Ok(());
        }

        let snapshot = SessionLastMessage {
            msg_id: message.id.clone(),
            msg_type: message.msg_type,
            sender_id: message.sender_id,
            digest: REVOKED_DIGEST.to_owned(),
        };

        let mut guard = self.database.begin_guard().await?;
        for user_id in users {
            self.database
                .update_session_last_message(
                    guard.executor()?,
                    user_id,
                    message.talk_id,
                    Some(&snapshot),
                )
                .await?;
        }
        guard.commit().await
    }

    /// Hydrate one stored message into its delivery view
    async fn hydrate_one(&self, viewer_id: i64, message: &Message) -> AppResult<MessageView> {
        let mut views = self
            .hydrate_batch(viewer_id, std::slice::from_ref(message))
            .await?;
        views
            .pop()
            .ok_or_else(|| AppError::internal("Message hydration produced no view"))
    }

    /// Hydrate stored messages into delivery views
    ///
    /// Quotes, mentions, and profiles are batch-fetched so a page costs a
    /// fixed number of queries regardless of its length. Quoted messages are
    /// read through the viewer's visibility filter.
    async fn hydrate_batch(
        &self,
        viewer_id: i64,
        messages: &[Message],
    ) -> AppResult<Vec<MessageView>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let quote_ids: Vec<String> = messages
            .iter()
            .filter_map(|m| m.quote_msg_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let quotes: HashMap<String, Message> = if quote_ids.is_empty() {
            HashMap::new()
        } else {
            self.database
                .get_messages_by_ids_for_user(&quote_ids, viewer_id)
                .await?
                .into_iter()
                .map(|m| (m.id.clone(), m))
                .collect()
        };

        let message_ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        let mentions = self
            .database
            .get_mentions_for_messages(&message_ids)
            .await?;

        let mut profile_ids: HashSet<i64> = messages.iter().map(|m| m.sender_id).collect();
        profile_ids.extend(quotes.values().map(|q| q.sender_id));
        let profile_ids: Vec<i64> = profile_ids.into_iter().collect();
        let profiles = self.directory.get_profiles(&profile_ids).await?;

        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let profile = profiles
                .get(&message.sender_id)
                .cloned()
                .unwrap_or_default();
            let quote = message
                .quote_msg_id
                .as_ref()
                .and_then(|id| quotes.get(id))
                .map(|quoted| QuotePreview {
                    msg_id: quoted.id.clone(),
                    msg_type: quoted.msg_type,
                    content: quoted.digest(),
                    sender_id: quoted.sender_id,
                    nickname: profiles
                        .get(&quoted.sender_id)
                        .map(|p| p.nickname.clone())
                        .unwrap_or_default(),
                });
            let mention_uids = mentions.get(&message.id).cloned().unwrap_or_default();

            views.push(MessageView {
                message: message.clone(),
                nickname: profile.nickname,
                avatar: profile.avatar,
                quote,
                mention_uids,
            });
        }

        Ok(views)
    }

    /// Push an event to a talk, bounded and best-effort
    async fn push_talk_event(
        &self,
        mode: TalkMode,
        to_from_id: i64,
        from_id: i64,
        event: &str,
        payload: Value,
    ) {
        if !self.push_enabled {
            return;
        }

        let push = self
            .notifier
            .push_talk_message(mode, to_from_id, from_id, event, payload);
        match tokio::time::timeout(self.push_timeout, push).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to push {event} event to talk with {to_from_id}: {e}"),
            Err(_) => warn!(
                "Push of {event} event timed out after {}ms",
                self.push_timeout.as_millis()
            ),
        };
    }

    /// Push an event to one user's devices, bounded and best-effort
    async fn push_user_event(&self, user_id: i64, event: &str, payload: Value) {
        if !self.push_enabled {
            return;
        }

        let push = self.notifier.push_to_user(user_id, event, payload, None);
        match tokio::time::timeout(self.push_timeout, push).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to push {event} event to user {user_id}: {e}"),
            Err(_) => warn!(
                "Push of {event} event to user {user_id} timed out after {}ms",
                self.push_timeout.as_millis()
            ),
        };
    }
}

/// Validate the synchronous parts of a send request
fn validate_send(params: &SendMessageParams) -> AppResult<()> {
    if params.client_msg_id.trim().is_empty() {
        return Err(AppError::invalid_input("client_msg_id must not be empty"));
    }
    if params.sender_id <= 0 || params.receiver_id <= 0 {
        return Err(AppError::invalid_input(
            "sender_id and receiver_id must be positive",
        ));
    }
    if params.talk_mode == TalkMode::Single && params.sender_id == params.receiver_id {
        return Err(AppError::invalid_input("Cannot send a message to yourself"));
    }
    if params.mention_uids.len() > limits::MAX_BATCH_IDS {
        return Err(AppError::invalid_input(format!(
            "Too many mentioned users (max {})",
            limits::MAX_BATCH_IDS
        )));
    }

    if params.msg_type == MessageType::Forward {
        if params.forward_msg_ids.is_empty() {
            return Err(AppError::invalid_input(
                "Forward messages require at least one source message",
            ));
        }
        if params.forward_msg_ids.len() > limits::MAX_BATCH_IDS {
            return Err(AppError::invalid_input(format!(
                "Too many forwarded messages (max {})",
                limits::MAX_BATCH_IDS
            )));
        }
    } else if !params.forward_msg_ids.is_empty() {
        return Err(AppError::invalid_input(
            "forward_msg_ids is only valid for forward messages",
        ));
    }

    Ok(())
}

/// Validate a per-user id batch and dedupe it, preserving order
fn validate_id_batch(user_id: i64, talk_id: i64, msg_ids: &[String]) -> AppResult<Vec<String>> {
    if user_id <= 0 || talk_id <= 0 {
        return Err(AppError::invalid_input(
            "user_id and talk_id must be positive",
        ));
    }
    if msg_ids.is_empty() {
        return Err(AppError::invalid_input("msg_ids must not be empty"));
    }
    if msg_ids.len() > limits::MAX_BATCH_IDS {
        return Err(AppError::invalid_input(format!(
            "Too many message ids (max {})",
            limits::MAX_BATCH_IDS
        )));
    }

    let mut seen = HashSet::with_capacity(msg_ids.len());
    let mut unique = Vec::with_capacity(msg_ids.len());
    for msg_id in msg_ids {
        if msg_id.trim().is_empty() {
            return Err(AppError::invalid_input("msg_ids must not contain blanks"));
        }
        if seen.insert(msg_id.as_str()) {
            unique.push(msg_id.clone());
        }
    }
    Ok(unique)
}

/// Clamp a caller-supplied page size into the allowed range
const fn clamp_records_limit(limit: i64) -> i64 {
    if limit <= 0 {
        limits::DEFAULT_RECORDS_LIMIT
    } else if limit > limits::MAX_RECORDS_LIMIT {
        limits::MAX_RECORDS_LIMIT
    } else {
        limit
    }
}

/// Session update payload pushed after a snapshot repair
fn session_update_payload(talk_id: i64, last: Option<&SessionLastMessage>) -> Value {
    json!({
        "talk_id": talk_id,
        "last_msg_id": last.map(|l| l.msg_id.clone()),
        "last_msg_type": last.map(|l| l.msg_type.code()),
        "last_sender_id": last.map(|l| l.sender_id),
        "last_msg_digest": last.map(|l| l.digest.clone()),
    })
}
