// ABOUTME: Engine-wide constants: push event names, paging limits, and environment defaults
// ABOUTME: Groups constants into nested modules so call sites read as constants::events::IM_MESSAGE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Constants Module
//!
//! Engine constants and environment-backed defaults. Event names are part of
//! the push contract with the delivery layer and must stay stable across
//! releases.

use std::env;

/// Push event names carried to the notification collaborator.
///
/// The delivery layer routes on these strings; renaming one is a wire-level
/// breaking change for every connected client.
pub mod events {
    /// New message appended to a talk
    pub const IM_MESSAGE: &str = "im.message";
    /// A message was revoked by its sender
    pub const IM_MESSAGE_REVOKE: &str = "im.message.revoke";
    /// Messages tombstoned from one user's view (multi-device sync)
    pub const IM_MESSAGE_DELETE: &str = "im.message.delete";
    /// Read receipts written for a talk
    pub const IM_MESSAGE_READ: &str = "im.message.read";
    /// A talk session came into existence for the counterpart to mirror
    pub const IM_TALK_CREATE: &str = "im.talk.create";
    /// One user's inbox row snapshot changed and should be re-rendered
    pub const IM_SESSION_UPDATE: &str = "im.session.update";
}

/// Paging and content limits
pub mod limits {
    /// Default page size for talk history
    pub const DEFAULT_RECORDS_LIMIT: i64 = 30;
    /// Hard cap on the page size a caller can request
    pub const MAX_RECORDS_LIMIT: i64 = 100;

    /// Maximum characters kept in an inbox-row text digest
    pub const DIGEST_MAX_CHARS: usize = 64;

    /// Upper bound on per-call batch sizes (message ids, mention lists)
    pub const MAX_BATCH_IDS: usize = 200;
}

/// Timeout and duration constants
pub mod timeouts {
    /// Post-commit push budget; the transaction is never held open this long
    pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 2_000;

    /// `SQLite` busy handler budget under write contention
    pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

    /// Retry attempts for lock contention on the send write path
    pub const SEND_WRITE_MAX_RETRIES: u32 = 3;
}

/// Environment-based configuration accessors
pub mod env_config {
    use super::env;

    /// Get database `URL` from environment or default
    #[must_use]
    pub fn database_url() -> String {
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./data/confab.db".into())
    }

    /// Get database pool size from environment or default
    #[must_use]
    pub fn database_max_connections() -> u32 {
        env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .unwrap_or(5)
    }

    /// Get the post-commit push timeout from environment or default
    #[must_use]
    pub fn push_timeout_ms() -> u64 {
        env::var("PUSH_TIMEOUT_MS")
            .unwrap_or_else(|_| super::timeouts::DEFAULT_PUSH_TIMEOUT_MS.to_string())
            .parse()
            .unwrap_or(super::timeouts::DEFAULT_PUSH_TIMEOUT_MS)
    }
}

/// Service identity
pub mod service {
    /// Service name for structured logging
    pub const SERVICE_NAME: &str = "confab-engine";

    /// Service version from Cargo.toml
    pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
}
