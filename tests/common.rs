// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory engines, profile seeding, and push event capture
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_in_or_patterns,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `confab_engine`
//!
//! This module provides common test setup functions to reduce duplication
//! across integration tests.

use std::sync::{Arc, Once};

use confab_engine::config::{DatabaseConfig, EngineConfig, Environment, LogLevel, PushConfig};
use confab_engine::database::Database;
use confab_engine::messages::MessageManager;
use confab_engine::models::{MessageType, SendMessageParams, TalkMode};
use confab_engine::notifications::{ChannelNotifier, PushEvent};
use confab_engine::profiles::{StaticDirectory, UserProfile};
use confab_engine::talks::TalkManager;
use tokio::sync::mpsc;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // TEST_LOG environment variable controls test logging level
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Engine configuration backed by a single-connection in-memory database
///
/// One connection keeps every pooled operation on the same `:memory:`
/// database; a second connection would see an empty schema.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        log_level: LogLevel::Error,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            busy_timeout_ms: 5_000,
            auto_migrate: true,
        },
        push: PushConfig {
            enabled: true,
            timeout_ms: 500,
        },
    }
}

/// Standard test database setup
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new(&test_config().database)
        .await
        .expect("Failed to create test database")
}

/// A fully wired engine with captured push events
pub struct TestEngine {
    pub database: Database,
    pub messages: MessageManager,
    pub talks: TalkManager,
    pub directory: Arc<StaticDirectory>,
    pub events: mpsc::Receiver<PushEvent>,
}

impl TestEngine {
    /// Drain every push event emitted so far
    pub fn drain_events(&mut self) -> Vec<PushEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Build an engine over the given configuration with users 1-5 seeded
pub async fn create_engine_with_config(config: &EngineConfig) -> TestEngine {
    init_test_logging();
    let database = Database::new(&config.database)
        .await
        .expect("Failed to create test database");

    let (notifier, events) = ChannelNotifier::channel(64);
    let notifier = Arc::new(notifier);
    let directory = Arc::new(StaticDirectory::new());
    for user_id in 1..=5 {
        seed_profile(&directory, user_id, &format!("User {user_id}"));
    }

    let messages = MessageManager::new(
        database.clone(),
        notifier.clone(),
        directory.clone(),
        config,
    );
    let talks = TalkManager::new(database.clone(), notifier, directory.clone(), config);

    TestEngine {
        database,
        messages,
        talks,
        directory,
        events,
    }
}

/// Standard in-memory engine setup
pub async fn create_test_engine() -> TestEngine {
    create_engine_with_config(&test_config()).await
}

/// File-backed engine for tests that need real pool concurrency
///
/// The caller owns the `TempDir`; dropping it deletes the database file.
pub async fn create_file_engine(dir: &tempfile::TempDir, max_connections: u32) -> TestEngine {
    let mut config = test_config();
    config.database.url = format!("sqlite://{}/engine.db", dir.path().display());
    config.database.max_connections = max_connections;
    create_engine_with_config(&config).await
}

/// Register a directory profile for a test user
pub fn seed_profile(directory: &StaticDirectory, user_id: i64, nickname: &str) {
    directory
        .insert(
            user_id,
            UserProfile {
                nickname: nickname.to_owned(),
                avatar: format!("https://cdn.confab.im/avatars/{user_id}.png"),
                motto: String::new(),
                is_bot: false,
            },
        )
        .expect("Failed to seed profile");
}

/// Open a 1:1 talk from both sides and return its talk id
pub async fn open_single_talk(engine: &TestEngine, uid_a: i64, uid_b: i64) -> i64 {
    let session = engine
        .talks
        .create_session(uid_a, uid_b, TalkMode::Single)
        .await
        .expect("Failed to open talk");
    engine
        .talks
        .create_session(uid_b, uid_a, TalkMode::Single)
        .await
        .expect("Failed to open counterpart session");
    session.talk_id
}

/// Plain text send parameters for a 1:1 talk
pub fn text_message(client_msg_id: &str, sender_id: i64, receiver_id: i64) -> SendMessageParams {
    SendMessageParams {
        client_msg_id: client_msg_id.to_owned(),
        talk_mode: TalkMode::Single,
        msg_type: MessageType::Text,
        sender_id,
        receiver_id,
        content: format!("message {client_msg_id}"),
        extra: None,
        quote_msg_id: None,
        mention_uids: Vec::new(),
        forward_msg_ids: Vec::new(),
    }
}

/// Plain text send parameters for a group talk
pub fn group_text_message(client_msg_id: &str, sender_id: i64, group_id: i64) -> SendMessageParams {
    SendMessageParams {
        talk_mode: TalkMode::Group,
        receiver_id: group_id,
        ..text_message(client_msg_id, sender_id, group_id)
    }
}
