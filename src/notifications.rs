// ABOUTME: Post-commit event delivery seam for gateway push infrastructure
// ABOUTME: Defines the Notifier trait plus channel-backed and no-op implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Event Delivery
//!
//! The engine never talks to sockets. After a transaction commits, the
//! orchestrators hand the resulting event to a [`Notifier`]; whatever sits
//! behind it (gateway fan-out, message queue, test collector) delivers it
//! to connected clients. Delivery is best-effort by contract: a failed or
//! slow push never un-commits anything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::TalkMode;

/// Delivery target of one push event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum PushScope {
    /// Deliver to a single user's devices
    User {
        /// Recipient user id
        user_id: i64,
        /// Client-side correlation id, echoed back for acknowledgement
        #[serde(skip_serializing_if = "Option::is_none")]
        ack_id: Option<String>,
    },
    /// Deliver to the participants of a talk
    Talk {
        /// Whether the talk is 1:1 or group
        talk_mode: TalkMode,
        /// Counterpart user id (single) or group id (group), from the
        /// sender's perspective
        to_from_id: i64,
        /// Sending user id
        from_id: i64,
    },
}

/// One event emitted after a committed engine operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    /// Server-assigned event id
    pub id: String,
    /// Event name, one of [`crate::constants::events`]
    pub event: String,
    /// Delivery target
    pub scope: PushScope,
    /// Event-specific JSON body
    pub payload: Value,
    /// Emission timestamp
    pub created_at: DateTime<Utc>,
}

impl PushEvent {
    fn new(event: &str, scope: PushScope, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event: event.to_owned(),
            scope,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Outbound event delivery
///
/// Implementations must be `Send + Sync`; the orchestrators share one
/// notifier across concurrent request tasks.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push an event to a single user's devices
    ///
    /// # Errors
    ///
    /// Returns an error if delivery handoff fails
    async fn push_to_user(
        &self,
        user_id: i64,
        event: &str,
        payload: Value,
        ack_id: Option<&str>,
    ) -> AppResult<()>;

    /// Push an event to the participants of a talk
    ///
    /// # Errors
    ///
    /// Returns an error if delivery handoff fails
    async fn push_talk_message(
        &self,
        mode: TalkMode,
        to_from_id: i64,
        from_id: i64,
        event: &str,
        payload: Value,
    ) -> AppResult<()>;
}

/// Notifier that emits events onto a bounded tokio channel
///
/// The engine stays decoupled from delivery: a gateway task consumes the
/// receiver and fans events out to live connections at its own pace.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<PushEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its event stream
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PushEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    async fn emit(&self, event: PushEvent) -> AppResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| AppError::internal("Push channel closed - no consumer attached"))
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn push_to_user(
        &self,
        user_id: i64,
        event: &str,
        payload: Value,
        ack_id: Option<&str>,
    ) -> AppResult<()> {
        self.emit(PushEvent::new(
            event,
            PushScope::User {
                user_id,
                ack_id: ack_id.map(ToOwned::to_owned),
            },
            payload,
        ))
        .await
    }

    async fn push_talk_message(
        &self,
        mode: TalkMode,
        to_from_id: i64,
        from_id: i64,
        event: &str,
        payload: Value,
    ) -> AppResult<()> {
        self.emit(PushEvent::new(
            event,
            PushScope::Talk {
                talk_mode: mode,
                to_from_id,
                from_id,
            },
            payload,
        ))
        .await
    }
}

/// Notifier that drops every event
///
/// For embedders that poll instead of push, and for tests that don't
/// assert on delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn push_to_user(
        &self,
        user_id: i64,
        event: &str,
        _payload: Value,
        _ack_id: Option<&str>,
    ) -> AppResult<()> {
        debug!(user_id = user_id, event = event, "Dropping push event");
        Ok(())
    }

    async fn push_talk_message(
        &self,
        _mode: TalkMode,
        to_from_id: i64,
        from_id: i64,
        event: &str,
        _payload: Value,
    ) -> AppResult<()> {
        debug!(
            to_from_id = to_from_id,
            from_id = from_id,
            event = event,
            "Dropping talk push event"
        );
        Ok(())
    }
}
