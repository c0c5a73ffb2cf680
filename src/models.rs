// ABOUTME: Core data models and types for the Confab talk and message engine
// ABOUTME: Defines Talk, Message, TalkSession and the integer-coded wire enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Data Models
//!
//! This module contains the core data structures used throughout the Confab
//! engine. These models mirror the storage schema one-to-one and carry the
//! integer codes used on the wire by older Confab clients.
//!
//! ## Design Principles
//!
//! - **Storage Faithful**: Row structs map 1:1 onto table columns
//! - **Integer Coded**: Wire enums convert to/from their legacy integer codes
//! - **Serializable**: All models support JSON serialization for gateway payloads
//! - **Type Safe**: Invalid codes are rejected at the boundary, not deep inside
//!
//! ## Core Models
//!
//! - `Talk`: Stable identity for a 1:1 pair or a group
//! - `Message`: One append-only log entry with revoke/status mutation fields
//! - `TalkSession`: A user's denormalized inbox row for one talk
//! - `MessageView`: A hydrated message ready for client delivery

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::limits;
use crate::errors::{AppError, AppResult};

/// Digest line shown in place of a revoked message
pub const REVOKED_DIGEST: &str = "[Message Recalled]";

/// Whether a talk binds a 1:1 user pair or a group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TalkMode {
    /// 1:1 talk, keyed by the normalized (min, max) user id pair
    Single,
    /// Group talk, keyed by the group id
    Group,
}

impl TalkMode {
    /// Integer code stored in the database and used on the wire
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Single => 1,
            Self::Group => 2,
        }
    }

    /// Parse a wire/storage code, rejecting unknown values
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown code
    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            1 => Ok(Self::Single),
            2 => Ok(Self::Group),
            other => Err(AppError::invalid_input(format!(
                "invalid talk mode code: {other}"
            ))),
        }
    }
}

impl Display for TalkMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Single => write!(f, "single"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Message payload kind
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text
    Text,
    /// Image attachment
    Image,
    /// Voice clip
    Voice,
    /// Video clip
    Video,
    /// Generic file attachment
    File,
    /// Geographic location
    Location,
    /// Contact / business card
    Card,
    /// Forward bundle referencing earlier messages
    Forward,
    /// Code snippet
    Code,
    /// Vote / poll
    Vote,
}

impl MessageType {
    /// Integer code stored in the database and used on the wire
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Text => 1,
            Self::Image => 2,
            Self::Voice => 3,
            Self::Video => 4,
            Self::File => 5,
            Self::Location => 6,
            Self::Card => 7,
            Self::Forward => 8,
            Self::Code => 9,
            Self::Vote => 10,
        }
    }

    /// Parse a wire/storage code, rejecting unknown values
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown code
    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            1 => Ok(Self::Text),
            2 => Ok(Self::Image),
            3 => Ok(Self::Voice),
            4 => Ok(Self::Video),
            5 => Ok(Self::File),
            6 => Ok(Self::Location),
            7 => Ok(Self::Card),
            8 => Ok(Self::Forward),
            9 => Ok(Self::Code),
            10 => Ok(Self::Vote),
            other => Err(AppError::invalid_input(format!(
                "invalid message type code: {other}"
            ))),
        }
    }

    /// Inbox digest line for a message of this kind
    ///
    /// Text content is truncated to a bounded number of characters; every
    /// other kind renders a fixed placeholder so attachments never leak
    /// payload details into the session list.
    #[must_use]
    pub fn digest(&self, content: &str) -> String {
        match self {
            Self::Text => content.chars().take(limits::DIGEST_MAX_CHARS).collect(),
            Self::Image => "[Image]".into(),
            Self::Voice => "[Voice]".into(),
            Self::Video => "[Video]".into(),
            Self::File => "[File]".into(),
            Self::Location => "[Location]".into(),
            Self::Card => "[Card]".into(),
            Self::Forward => "[Forwarded Records]".into(),
            Self::Code => "[Code Snippet]".into(),
            Self::Vote => "[Vote]".into(),
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Voice => write!(f, "voice"),
            Self::Video => write!(f, "video"),
            Self::File => write!(f, "file"),
            Self::Location => write!(f, "location"),
            Self::Card => write!(f, "card"),
            Self::Forward => write!(f, "forward"),
            Self::Code => write!(f, "code"),
            Self::Vote => write!(f, "vote"),
        }
    }
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Accepted but not yet confirmed delivered
    Sending,
    /// Confirmed sent
    #[default]
    Sent,
    /// Delivery failed
    Failed,
}

impl MessageStatus {
    /// Integer code stored in the database and used on the wire
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Sending => 1,
            Self::Sent => 2,
            Self::Failed => 3,
        }
    }

    /// Parse a wire/storage code, rejecting unknown values
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown code
    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            1 => Ok(Self::Sending),
            2 => Ok(Self::Sent),
            3 => Ok(Self::Failed),
            other => Err(AppError::invalid_input(format!(
                "invalid message status code: {other}"
            ))),
        }
    }
}

/// Revocation state of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevokeStatus {
    /// Message is live
    #[default]
    Normal,
    /// Message has been recalled by its sender
    Revoked,
}

impl RevokeStatus {
    /// Integer code stored in the database and used on the wire
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Revoked => 1,
        }
    }

    /// Parse a wire/storage code, rejecting unknown values
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown code
    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Revoked),
            other => Err(AppError::invalid_input(format!(
                "invalid revoke status code: {other}"
            ))),
        }
    }

    /// Check if the message has been revoked
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}

/// Stable identity for a conversation
///
/// One row per 1:1 pair or group, created lazily on first use and never
/// deleted. The unique key over (mode, pair, group) is what makes concurrent
/// first-contact sends converge on a single id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Talk {
    pub id: i64,
    pub talk_mode: TalkMode,
    /// Smaller user id of the pair (0 for group talks)
    pub user_min_id: i64,
    /// Larger user id of the pair (0 for group talks)
    pub user_max_id: i64,
    /// Group id (0 for single talks)
    pub group_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Talk {
    /// Normalize a user pair to the canonical (min, max) storage order
    #[must_use]
    pub const fn normalize_pair(uid_a: i64, uid_b: i64) -> (i64, i64) {
        if uid_a <= uid_b {
            (uid_a, uid_b)
        } else {
            (uid_b, uid_a)
        }
    }
}

/// One entry in the append-only message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Client-generated message id, unique across all talks
    pub id: String,
    pub talk_id: i64,
    /// Per-talk strictly increasing order key
    pub sequence: i64,
    pub talk_mode: TalkMode,
    pub msg_type: MessageType,
    pub sender_id: i64,
    /// Counterpart user id (single) or group id (group)
    pub receiver_id: i64,
    pub content: String,
    /// Kind-specific payload as a JSON document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// Id of the message this one quotes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_msg_id: Option<String>,
    pub is_revoked: RevokeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoke_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoke_time: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Inbox digest line for this message
    ///
    /// Revoked messages render the recall placeholder regardless of their
    /// original kind.
    #[must_use]
    pub fn digest(&self) -> String {
        if self.is_revoked.is_revoked() {
            return REVOKED_DIGEST.to_owned();
        }
        self.msg_type.digest(&self.content)
    }
}

/// Provenance link from a forward message to one source message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageForwardRef {
    /// Id of the forward message carrying the bundle
    pub forward_msg_id: String,
    /// Id of the original message being forwarded
    pub src_msg_id: String,
    /// Talk the original message lives in
    pub src_talk_id: i64,
    /// Original sender
    pub src_sender_id: i64,
}

/// A user's denormalized inbox row for one talk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalkSession {
    pub id: i64,
    pub user_id: i64,
    pub talk_id: i64,
    pub talk_mode: TalkMode,
    /// Counterpart user id (single) or group id (group)
    pub to_from_id: i64,
    /// Pinned to the top of the session list
    pub is_top: bool,
    /// Muted: new messages do not raise notifications
    pub is_disturb: bool,
    /// Counterpart is a bot account
    pub is_robot: bool,
    /// Highest sequence the user has acknowledged reading
    pub last_ack_seq: i64,
    pub unread_num: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_msg_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_msg_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sender_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_msg_digest: Option<String>,
    /// Unsent draft text, empty when none
    pub draft_text: String,
    /// Snapshot of the counterpart display name at session creation
    pub name: String,
    /// Snapshot of the counterpart avatar at session creation
    pub avatar: String,
    /// Snapshot of the counterpart motto/remark at session creation
    pub remark: String,
    /// Soft-delete marker; set rows are hidden from listings and bumps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or re-activating a session row
#[derive(Debug, Clone)]
pub struct NewTalkSession {
    pub user_id: i64,
    pub talk_id: i64,
    pub talk_mode: TalkMode,
    pub to_from_id: i64,
    /// Counterpart display name snapshot
    pub name: String,
    /// Counterpart avatar snapshot
    pub avatar: String,
    /// Counterpart motto/remark snapshot
    pub remark: String,
    pub is_robot: bool,
}

/// Snapshot update applied to every recipient inbox row when a message lands
#[derive(Debug, Clone)]
pub struct SessionBump {
    pub talk_id: i64,
    /// Sender whose own row is skipped by the bump
    pub sender_id: i64,
    pub last_msg_id: String,
    pub last_msg_type: MessageType,
    pub digest: String,
}

/// Replacement last-message snapshot for a single inbox row
#[derive(Debug, Clone)]
pub struct SessionLastMessage {
    pub msg_id: String,
    pub msg_type: MessageType,
    pub sender_id: i64,
    pub digest: String,
}

impl SessionLastMessage {
    /// Build a snapshot from a stored message
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            msg_id: message.id.clone(),
            msg_type: message.msg_type,
            sender_id: message.sender_id,
            digest: message.digest(),
        }
    }
}

/// Input to `MessageManager::send_message`
#[derive(Debug, Clone)]
pub struct SendMessageParams {
    /// Client-generated message id; retrying with the same id is idempotent
    pub client_msg_id: String,
    pub talk_mode: TalkMode,
    pub msg_type: MessageType,
    pub sender_id: i64,
    /// Counterpart user id (single) or group id (group)
    pub receiver_id: i64,
    pub content: String,
    /// Kind-specific payload as a JSON document
    pub extra: Option<String>,
    /// Id of the message being quoted, if any
    pub quote_msg_id: Option<String>,
    /// Users called out in the message body
    pub mention_uids: Vec<i64>,
    /// Source message ids for a forward bundle (Forward kind only)
    pub forward_msg_ids: Vec<String>,
}

/// Compact preview of a quoted message, hydrated alongside the quoting one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotePreview {
    pub msg_id: String,
    pub msg_type: MessageType,
    /// Digest-style preview, never the full payload
    pub content: String,
    pub sender_id: i64,
    pub nickname: String,
}

/// A message hydrated with display data, ready for client delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    /// Sender display name at read time
    pub nickname: String,
    /// Sender avatar at read time
    pub avatar: String,
    /// Preview of the quoted message, absent when nothing visible is quoted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuotePreview>,
    /// Users mentioned by this message
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mention_uids: Vec<i64>,
}

/// One page of talk records plus the cursor for the next older page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsPage {
    pub items: Vec<MessageView>,
    /// Anchor for the next page; 0 means the history is exhausted
    pub next_anchor_seq: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_talk_mode_codes_round_trip() {
        assert_eq!(TalkMode::Single.code(), 1);
        assert_eq!(TalkMode::Group.code(), 2);
        assert_eq!(
            TalkMode::from_code(1).expect("single decodes"),
            TalkMode::Single
        );
        assert_eq!(
            TalkMode::from_code(2).expect("group decodes"),
            TalkMode::Group
        );
        assert!(TalkMode::from_code(3).is_err());
        assert!(TalkMode::from_code(0).is_err());
    }

    #[test]
    fn test_message_type_codes_round_trip() {
        for kind in [
            MessageType::Text,
            MessageType::Image,
            MessageType::Voice,
            MessageType::Video,
            MessageType::File,
            MessageType::Location,
            MessageType::Card,
            MessageType::Forward,
            MessageType::Code,
            MessageType::Vote,
        ] {
            let decoded = MessageType::from_code(kind.code()).expect("known code decodes");
            assert_eq!(decoded, kind, "code {} should round-trip", kind.code());
        }
        assert!(MessageType::from_code(0).is_err());
        assert!(MessageType::from_code(11).is_err());
    }

    #[test]
    fn test_text_digest_truncates() {
        let long = "x".repeat(500);
        let digest = MessageType::Text.digest(&long);
        assert_eq!(digest.chars().count(), limits::DIGEST_MAX_CHARS);

        let short = MessageType::Text.digest("hello");
        assert_eq!(short, "hello");
    }

    #[test]
    fn test_attachment_digest_is_placeholder() {
        assert_eq!(MessageType::Image.digest("https://cdn/img.png"), "[Image]");
        assert_eq!(MessageType::Forward.digest(""), "[Forwarded Records]");
        assert_eq!(MessageType::Vote.digest("{\"title\":\"?\"}"), "[Vote]");
    }

    #[test]
    fn test_pair_normalization() {
        assert_eq!(Talk::normalize_pair(9, 4), (4, 9));
        assert_eq!(Talk::normalize_pair(4, 9), (4, 9));
        assert_eq!(Talk::normalize_pair(7, 7), (7, 7));
    }

    #[test]
    fn test_revoke_status_flags() {
        assert!(!RevokeStatus::Normal.is_revoked());
        assert!(RevokeStatus::Revoked.is_revoked());
        assert_eq!(RevokeStatus::default(), RevokeStatus::Normal);
    }
}
