// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! Environment-based configuration management for production deployment

use crate::constants::{env_config, timeouts};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Environment type for deployment-specific behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Check if this is a development environment
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if this is a testing environment
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
            Environment::Testing => write!(f, "testing"),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log level
    pub log_level: LogLevel,
    /// Environment type (development, production, testing)
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Post-commit push delivery configuration
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite path or connection string)
    pub url: String,
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
    /// Enable database migrations on startup
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Enable post-commit push delivery
    pub enabled: bool,
    /// Per-push delivery timeout in milliseconds
    pub timeout_ms: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value or if
    /// validation fails
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = EngineConfig {
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")?),
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )?),

            database: DatabaseConfig {
                url: env_config::database_url(),
                max_connections: env_config::database_max_connections(),
                busy_timeout_ms: env_var_or(
                    "DATABASE_BUSY_TIMEOUT_MS",
                    &timeouts::DEFAULT_BUSY_TIMEOUT_MS.to_string(),
                )?
                .parse()
                .context("Invalid DATABASE_BUSY_TIMEOUT_MS value")?,
                auto_migrate: env_var_or("AUTO_MIGRATE", "true")?
                    .parse()
                    .context("Invalid AUTO_MIGRATE value")?,
            },

            push: PushConfig {
                enabled: env_var_or("PUSH_ENABLED", "true")?
                    .parse()
                    .context("Invalid PUSH_ENABLED value")?,
                timeout_ms: env_config::push_timeout_ms(),
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error for an empty database URL or a zero-sized pool
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow::anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be at least 1"
            ));
        }

        if self.push.enabled && self.push.timeout_ms == 0 {
            warn!("Push delivery is enabled with a zero timeout; pushes will always be dropped");
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    pub fn summary(&self) -> String {
        format!(
            "Confab Engine Configuration:\n\
             - Log Level: {}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Pool Size: {}\n\
             - Auto Migrate: {}\n\
             - Push Delivery: {}\n\
             - Push Timeout: {}ms",
            self.log_level,
            self.environment,
            if self.database.url.starts_with("sqlite:") {
                "SQLite"
            } else {
                "External"
            },
            self.database.max_connections,
            self.database.auto_migrate,
            if self.push.enabled {
                "Enabled"
            } else {
                "Disabled"
            },
            self.push.timeout_ms,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
}
