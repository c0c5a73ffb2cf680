// ABOUTME: Talk lifecycle orchestrator for the Confab engine
// ABOUTME: Opens talks, manages per-user session rows, flags, drafts, and unread state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Talk Manager
//!
//! [`TalkManager`] owns the talk-level surface that sits in front of the
//! message log: opening a talk (find-or-create identity plus the caller's
//! inbox row), listing the inbox, and the small per-session mutations
//! (pin, mute, draft, soft delete, unread clearing).
//!
//! Opening a talk provisions only the caller's session row. The counterpart
//! learns about it from the talk-create push and provisions its own row when
//! its client calls [`TalkManager::create_session`] in turn.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::constants::events;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{NewTalkSession, TalkMode, TalkSession};
use crate::notifications::Notifier;
use crate::profiles::{UserDirectory, UserProfile};

/// Orchestrator for talk identity and session rows
pub struct TalkManager {
    database: Database,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn UserDirectory>,
    push_enabled: bool,
    push_timeout: Duration,
}

impl TalkManager {
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

    /// Open a talk with a user or group and return the caller's session row
    ///
    /// Find-or-create on the talk identity, so both parties opening the same
    /// 1:1 talk concurrently converge on one talk id. Re-opening refreshes
    /// the profile snapshot and revives a soft-deleted row without touching
    /// unread counts, flags, or drafts.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive ids or a 1:1 talk with
    /// oneself, and a not-found error when the counterpart user is unknown
    /// to the directory
    pub async fn create_session(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
    ) -> AppResult<TalkSession> {
        if user_id <= 0 || to_from_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and to_from_id must be positive",
            ));
        }
        if mode == TalkMode::Single && user_id == to_from_id {
            return Err(AppError::invalid_input("Cannot open a talk with yourself"));
        }

        let profile = match mode {
            TalkMode::Single => self
                .directory
                .get_profile(to_from_id)
                .await?
                .ok_or_else(|| AppError::not_found("user"))?,
            // Group naming lives outside the directory; snapshot defaults
            TalkMode::Group => UserProfile::default(),
        };

        let mut guard = self.database.begin_guard().await?;
        let talk_id = match mode {
            TalkMode::Single => {
                self.database
                    .find_or_create_single_talk(guard.executor()?, user_id, to_from_id)
                    .await?
            }
            TalkMode::Group => {
                self.database
                    .find_or_create_group_talk(guard.executor()?, to_from_id)
                    .await?
            }
        };
        let session = self
            .database
            .upsert_session(
                guard.executor()?,
                &NewTalkSession {
                    user_id,
                    talk_id,
                    talk_mode: mode,
                    to_from_id,
                    name: profile.nickname,
                    avatar: profile.avatar,
                    remark: profile.motto,
                    is_robot: profile.is_bot,
                },
            )
            .await?;
        guard.commit().await?;

        debug!("User {user_id} opened talk {talk_id} with {to_from_id}");

        if mode == TalkMode::Single {
            let payload = json!({
                "talk_id": talk_id,
                "talk_mode": mode,
                "from_id": user_id,
            });
            self.push_user_event(to_from_id, events::IM_TALK_CREATE, payload)
                .await;
        }

        Ok(session)
    }

    /// List a user's inbox, pinned rows first, most recent activity next
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive user id
    pub async fn get_session_list(&self, user_id: i64) -> AppResult<Vec<TalkSession>> {
        if user_id <= 0 {
            return Err(AppError::invalid_input("user_id must be positive"));
        }
        self.database.list_sessions(user_id).await
    }

    /// Pin or unpin a session at the top of the inbox
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no live session matches
    pub async fn set_session_top(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        is_top: bool,
    ) -> AppResult<()> {
        if user_id <= 0 || to_from_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and to_from_id must be positive",
            ));
        }

        let changed = self
            .database
            .set_session_top(user_id, to_from_id, mode, is_top)
            .await?;
        if !changed {
            return Err(AppError::not_found("session"));
        }
        Ok(())
    }

    /// Mute or unmute notifications for a session
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no live session matches
    pub async fn set_session_disturb(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        is_disturb: bool,
    ) -> AppResult<()> {
        if user_id <= 0 || to_from_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and to_from_id must be positive",
            ));
        }

        let changed = self
            .database
            .set_session_disturb(user_id, to_from_id, mode, is_disturb)
            .await?;
        if !changed {
            return Err(AppError::not_found("session"));
        }
        Ok(())
    }

    /// Remove a session from the user's inbox
    ///
    /// Soft delete: the row survives with its flags and ack state and is
    /// revived by the next [`Self::create_session`] or left dormant. The
    /// talk itself and its messages are untouched.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no live session matches
    pub async fn delete_session(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
    ) -> AppResult<()> {
        if user_id <= 0 || to_from_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and to_from_id must be positive",
            ));
        }

        let removed = self
            .database
            .soft_delete_session(user_id, to_from_id, mode)
            .await?;
        if !removed {
            return Err(AppError::not_found("session"));
        }

        debug!("User {user_id} removed the session with {to_from_id} from their inbox");
        Ok(())
    }

    /// Zero the unread badge for a session and acknowledge the whole talk
    ///
    /// Advances `last_ack_seq` to the talk's committed high-water mark (the
    /// ack never moves backwards) and writes bulk read receipts for every
    /// counterpart message in the same transaction, so the badge and the
    /// receipts always land together.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no live session matches
    pub async fn clear_session_unread(&self, user_id: i64, talk_id: i64) -> AppResult<()> {
        if user_id <= 0 || talk_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and talk_id must be positive",
            ));
        }

        let high_water = self.database.current_sequence(talk_id).await?;

        let mut guard = self.database.begin_guard().await?;
        let changed = self
            .database
            .clear_session_unread(guard.executor()?, user_id, talk_id, high_water)
            .await?;
        if !changed {
            guard.rollback().await?;
            return Err(AppError::not_found("session"));
        }
        let receipts = self
            .database
            .mark_talk_read(guard.executor()?, talk_id, user_id)
            .await?;
        guard.commit().await?;

        debug!("User {user_id} acknowledged talk {talk_id} ({receipts} new receipts)");
        Ok(())
    }

    /// Store the user's unsent draft for a session
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no live session matches
    pub async fn set_session_draft(
        &self,
        user_id: i64,
        to_from_id: i64,
        mode: TalkMode,
        draft: &str,
    ) -> AppResult<()> {
        if user_id <= 0 || to_from_id <= 0 {
            return Err(AppError::invalid_input(
                "user_id and to_from_id must be positive",
            ));
        }

        let changed = self
            .database
            .set_session_draft(user_id, to_from_id, mode, draft)
            .await?;
        if !changed {
            return Err(AppError::not_found("session"));
        }
        Ok(())
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
