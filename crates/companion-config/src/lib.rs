// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion Configuration System
//!
//! Type-safe configuration loader for the touch companion with support for:
//! - TOML file parsing (`companion.toml`)
//! - Environment variable overrides (`COMPANION_*`)
//! - CLI argument overrides
//! - Environment profiles (development, production, test)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use companion_config::load_config;
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("API: {}:{}", config.api.host, config.api.port);
//! println!("Thresholds: {} / {}", config.emotional_state.lower_threshold,
//!          config.emotional_state.upper_threshold);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, apply_environment_profile,
    find_config_file, load_config, CONFIG_FILE_NAME, CONFIG_PATH_ENV,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CompanionConfig::default();
        validate_config(&config).unwrap();
    }
}
