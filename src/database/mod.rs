// ABOUTME: Database management for talks, sequences, messages, and session rows
// ABOUTME: Owns the SQLite pool, runs migrations, and hosts the per-domain operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # Database Management
//!
//! This module provides storage for the Confab engine. One [`Database`] owns
//! the `SQLite` pool; the per-domain operation sets live in submodules as
//! `impl Database` blocks:
//!
//! - `talks`: stable talk identity rows
//! - `sequences`: per-talk order key allocation
//! - `messages`: the append-only message log and its side tables
//! - `sessions`: denormalized per-user inbox rows
//!
//! Methods that must observe or join an open transaction take the caller's
//! `&mut SqliteConnection`; plain reads run on the pool.

mod messages;
mod sequences;
mod sessions;
mod talks;

/// Transaction guards and retry helpers
pub mod transactions;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, AppResult};

/// Database manager for the talk and message store
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database described by `config`
    ///
    /// Runs migrations when `config.auto_migrate` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be opened or migrations fail
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if config.url.starts_with("sqlite:") && !config.url.contains('?') {
            format!("{}?mode=rwc", config.url)
        } else {
            config.url.clone()
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        let db = Self { pool };
        db.apply_pragmas(config.busy_timeout_ms).await?;

        if config.auto_migrate {
            db.migrate().await?;
        }

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Begin a transaction wrapped in a rollback-on-drop guard
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be acquired
    pub async fn begin_guard(&self) -> AppResult<transactions::TransactionGuard<'static>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
        Ok(transactions::TransactionGuard::new(tx))
    }

    /// Session-level pragmas
    ///
    /// `journal_mode` persists on the database file; `busy_timeout` applies
    /// per connection on top of the pool defaults.
    async fn apply_pragmas(&self, busy_timeout_ms: u64) -> AppResult<()> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to set journal mode: {e}")))?;

        sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to set busy timeout: {e}")))?;

        Ok(())
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index creation fails
    pub async fn migrate(&self) -> AppResult<()> {
        // Talk identity tables
        self.migrate_talks().await?;

        // Sequence allocator table
        self.migrate_sequences().await?;

        // Message log and side tables
        self.migrate_messages().await?;

        // Per-user session rows
        self.migrate_sessions().await?;

        info!("Database migrations completed");
        Ok(())
    }
}
