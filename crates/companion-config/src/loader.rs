// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Loading happens in tiers, later tiers winning:
//! 1. TOML file (or built-in defaults when no file exists)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)
//! 4. Environment profile adjustments (production/test)
//!
//! The result is validated before it is returned.

use crate::validation::validate_config;
use crate::{CompanionConfig, ConfigError, ConfigResult, Environment};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "companion.toml";

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "COMPANION_CONFIG_PATH";

/// Find the companion configuration file
///
/// Search order:
/// 1. `COMPANION_CONFIG_PATH` environment variable
/// 2. Current working directory: `./companion.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if the file named by
/// `COMPANION_CONFIG_PATH` is missing, or if no file exists in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration
///
/// # Arguments
///
/// * `config_path` - Explicit config file. Must exist when given. If `None`,
///   the file is searched for and defaults are used when none is found.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if an explicit or `COMPANION_CONFIG_PATH` file is missing, the
/// TOML is invalid, or the final configuration fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CompanionConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(err) if env::var(CONFIG_PATH_ENV).is_ok() => return Err(err),
            Err(_) => None,
        },
    };

    let mut config: CompanionConfig = match config_file {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => CompanionConfig::default(),
    };

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    apply_environment_profile(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `COMPANION_API_HOST` -> `api.host`
/// - `COMPANION_API_PORT` -> `api.port`
/// - `COMPANION_DATA_DIR` -> `system.data_dir`
/// - `COMPANION_LOG_LEVEL` -> `system.log_level`
/// - `COMPANION_ENV` -> `system.environment`
/// - `COMPANION_LED_COUNT` -> `led.led_count`
///
/// Unparseable values are ignored.
pub fn apply_environment_overrides(config: &mut CompanionConfig) {
    if let Ok(value) = env::var("COMPANION_API_HOST") {
        config.api.host = value;
    }
    if let Ok(value) = env::var("COMPANION_API_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.api.port = port;
        }
    }
    if let Ok(value) = env::var("COMPANION_DATA_DIR") {
        config.system.data_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("COMPANION_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("COMPANION_ENV") {
        if let Ok(environment) = value.parse::<Environment>() {
            config.system.environment = environment;
        }
    }
    if let Ok(value) = env::var("COMPANION_LED_COUNT") {
        if let Ok(count) = value.parse::<usize>() {
            config.led.led_count = count;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"api_host": "192.168.1.1", "api_port": "9000"}`)
///
/// # Errors
///
/// Unlike environment overrides, a CLI value that does not parse is an error.
pub fn apply_cli_overrides(
    config: &mut CompanionConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("api_host") {
        config.api.host = value.clone();
    }
    if let Some(value) = cli_args.get("api_port") {
        config.api.port = parse_override("api_port", value)?;
    }
    if let Some(value) = cli_args.get("data_dir") {
        config.system.data_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("environment") {
        config.system.environment = value
            .parse::<Environment>()
            .map_err(ConfigError::InvalidValue)?;
    }
    if let Some(value) = cli_args.get("led_count") {
        config.led.led_count = parse_override("led_count", value)?;
    }
    Ok(())
}

/// Adjust settings that depend on the deployment profile
///
/// - `production`: manual state override disabled, wildcard CORS narrowed to
///   `http://localhost:<port>`
/// - `test`: event journal disabled (memory only)
pub fn apply_environment_profile(config: &mut CompanionConfig) {
    match config.system.environment {
        Environment::Production => {
            config.api.allow_manual_override = false;
            if config.api.cors_origins.iter().any(|o| o == "*") {
                config.api.cors_origins = vec![format!("http://localhost:{}", config.api.port)];
            }
        }
        Environment::Test => {
            config.persistence.journal_enabled = false;
        }
        Environment::Development => {}
    }
}
