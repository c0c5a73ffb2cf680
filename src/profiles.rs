// ABOUTME: User directory seam for resolving display profiles during hydration
// ABOUTME: Defines the UserDirectory trait plus an in-memory implementation for embedders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! # User Directory
//!
//! The engine stores user ids, never user records. Display data - nickname,
//! avatar, motto, bot flag - lives in whatever identity service the embedder
//! runs, reached through [`UserDirectory`]. Orchestrators call it when
//! hydrating messages for delivery and when snapshotting a counterpart
//! profile into a fresh session row.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Display profile of one user
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    /// Display name
    pub nickname: String,
    /// Avatar URL
    pub avatar: String,
    /// Profile tagline
    pub motto: String,
    /// Whether the account is a bot
    pub is_bot: bool,
}

/// Read access to the embedder's identity service
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch one user's profile; unknown users are `Ok(None)`
    ///
    /// # Errors
    ///
    /// Returns an error if the identity service lookup fails
    async fn get_profile(&self, user_id: i64) -> AppResult<Option<UserProfile>>;

    /// Batch fetch profiles, keyed by user id; unknown users are omitted
    ///
    /// The default implementation loops over [`get_profile`]; directories
    /// backed by a remote service should override it with a real batch
    /// call.
    ///
    /// # Errors
    ///
    /// Returns an error if any single lookup fails
    ///
    /// [`get_profile`]: UserDirectory::get_profile
    async fn get_profiles(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, UserProfile>> {
        let mut profiles = HashMap::with_capacity(user_ids.len());
        for &user_id in user_ids {
            if profiles.contains_key(&user_id) {
                continue;
            }
            if let Some(profile) = self.get_profile(user_id).await? {
                profiles.insert(user_id, profile);
            }
        }
        Ok(profiles)
    }
}

/// In-memory directory for embedders, bot registries, and tests
#[derive(Debug, Default)]
pub struct StaticDirectory {
    profiles: RwLock<HashMap<i64, UserProfile>>,
}

impl StaticDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user's profile
    ///
    /// # Errors
    ///
    /// Returns an error if the directory lock is poisoned
    pub fn insert(&self, user_id: i64, profile: UserProfile) -> AppResult<()> {
        self.profiles
            .write()
            .map_err(|_| AppError::internal("User directory lock poisoned"))?
            .insert(user_id, profile);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_profile(&self, user_id: i64) -> AppResult<Option<UserProfile>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| AppError::internal("User directory lock poisoned"))?;
        Ok(profiles.get(&user_id).cloned())
    }
}
