// ABOUTME: Configuration management module for centralized engine settings and parameters
// ABOUTME: Handles environment-driven configs for database, push delivery, and runtime options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Confab.im

//! Configuration module for the Confab engine
//!
//! This module provides centralized configuration management for all
//! components of the engine:
//!
//! - **Environment**: Engine configuration from environment variables

/// Environment and engine configuration
pub mod environment;

pub use environment::{DatabaseConfig, EngineConfig, Environment, LogLevel, PushConfig};
