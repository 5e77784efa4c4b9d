//! Configuration management for hookboard
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use hookboard::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Talking to: {}", config.api.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `HOOKBOARD__<section>__<key>`
//!
//! Examples:
//! - `HOOKBOARD__API__BASE_URL=https://hooks.example.com/api`
//! - `HOOKBOARD__CACHE__STALE_TIME=10s`
//! - `HOOKBOARD__DISPATCH__MAX_ATTEMPTS=3`
//!
//! The bearer token is only ever read from `HOOKBOARD_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/hookboard.toml`.
//! This can be overridden using the `HOOKBOARD_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{ApiConfig, AuthConfig, CacheConfig, Config, DispatchConfig, PaginationConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`HOOKBOARD__*`)
    /// 2. TOML file (default: `config/hookboard.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, still honoring environment
    /// overrides and the token secret
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_at(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
