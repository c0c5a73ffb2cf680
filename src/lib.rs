// ABOUTME: Main library entry point for the Confab talk and message engine
// ABOUTME: Provides talk identity, ordered message logs, and per-user inbox state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Confab Engine
//!
//! The consistency core of the Confab instant-messaging backend: stable talk
//! identity for 1:1 and group chats, strictly increasing per-talk message
//! sequences, an append-only message log with revoke/read/forward side
//! tables, and denormalized per-user inbox rows.
//!
//! ## Features
//!
//! - **Stable talk identity**: one talk id per user pair or group, race-free
//!   under concurrent creation
//! - **Total per-talk order**: a transactional sequence allocator keyed by
//!   talk id; gaps allowed, regressions never
//! - **Idempotent sends**: client-generated message ids make retries safe
//! - **Denormalized inbox**: unread counts and last-message snapshots are
//!   maintained inline with every append
//! - **Decoupled delivery**: post-commit events flow through a [`Notifier`]
//!   so transports stay outside the engine
//!
//! [`Notifier`]: notifications::Notifier
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use confab_engine::config::EngineConfig;
//! use confab_engine::database::Database;
//! use confab_engine::errors::AppResult;
//! use confab_engine::messages::MessageManager;
//! use confab_engine::notifications::ChannelNotifier;
//! use confab_engine::profiles::StaticDirectory;
//! use confab_engine::talks::TalkManager;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     // Load configuration
//!     let config = EngineConfig::from_env()?;
//!     let database = Database::new(&config.database).await?;
//!
//!     let (notifier, _events) = ChannelNotifier::channel(1024);
//!     let notifier: Arc<ChannelNotifier> = Arc::new(notifier);
//!     let directory = Arc::new(StaticDirectory::new());
//!
//!     let talks = TalkManager::new(
//!         database.clone(),
//!         notifier.clone(),
//!         directory.clone(),
//!         &config,
//!     );
//!     let messages = MessageManager::new(database, notifier, directory, &config);
//!
//!     println!(
//!         "Confab engine ready (push enabled: {})",
//!         config.push.enabled
//!     );
//!     let _ = (talks, messages);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The engine follows a layered architecture:
//! - **Models**: storage-faithful row structs and integer-coded wire enums
//! - **Database**: one pool owner with per-domain operation sets (talks,
//!   sequences, messages, sessions) and transaction guards
//! - **Managers**: `MessageManager` and `TalkManager` orchestrate the
//!   multi-step flows and own the push fan-out
//! - **Seams**: `Notifier` and `UserDirectory` traits keep delivery and
//!   identity lookups pluggable

// ── Public API ──────────────────────────────────────────────────────────
// These modules are used by integration tests (tests/) and embedding
// services. They must remain `pub` so external consumers can access them.

/// Configuration management with environment variable support
pub mod config;

/// Event names, limits, timeouts, and environment variable keys
pub mod constants;

/// `SQLite` storage layer: pool ownership, migrations, per-domain operations
pub mod database;

/// Typed error handling with error codes
pub mod errors;

/// Structured logging initialization
pub mod logging;

/// Message orchestrator: send, page, revoke, read, delete
pub mod messages;

/// Core data models for talks, messages, and sessions
pub mod models;

/// Outbound push events and the `Notifier` delivery seam
pub mod notifications;

/// User directory seam for profile snapshots and hydration
pub mod profiles;

/// Talk orchestrator: open talks, inbox listing, session mutations
pub mod talks;
