// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every violation is collected so a bad file is reported in one pass.

use crate::{CompanionConfig, ConfigError, ConfigResult, MetricKind};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidPortRange { port_name: String, port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPortRange { port_name, port } => {
                write!(
                    f,
                    "Port {} = {} is outside valid range (1024-65535)",
                    port_name, port
                )
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - API port range
/// - Required fields (host, data directory, file names)
/// - Threshold ordering for the selected metric
/// - Non-zero intervals, step counts and queue capacity
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &CompanionConfig) -> ConfigResult<()> {
    let errors = collect_violations(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// All violations found in `config` (empty when valid)
pub fn collect_violations(config: &CompanionConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_required_fields(config, &mut errors);
    validate_sensor(config, &mut errors);
    validate_emotional_state(config, &mut errors);
    validate_intervals(config, &mut errors);
    errors
}

fn invalid(errors: &mut Vec<ConfigValidationError>, field: &str, reason: impl Into<String>) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    });
}

fn validate_required_fields(config: &CompanionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.api.port < 1024 {
        errors.push(ConfigValidationError::InvalidPortRange {
            port_name: "api.port".to_string(),
            port: config.api.port,
        });
    }
    if config.api.host.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "api.host".to_string(),
        });
    }
    if config.system.data_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "system.data_dir".to_string(),
        });
    }
    if config.persistence.state_file.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "persistence.state_file".to_string(),
        });
    }
    if config.persistence.journal_enabled && config.persistence.journal_file.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "persistence.journal_file".to_string(),
        });
    }
}

fn validate_sensor(config: &CompanionConfig, errors: &mut Vec<ConfigValidationError>) {
    let sensor = &config.sensor;
    if sensor.channel_count == 0 || sensor.channel_count > 12 {
        invalid(
            errors,
            "sensor.channel_count",
            format!("{} is outside 1..=12", sensor.channel_count),
        );
    }
    if sensor.poll_interval_ms == 0 {
        invalid(errors, "sensor.poll_interval_ms", "must be greater than 0");
    }
    if sensor.max_consecutive_failures == 0 {
        invalid(errors, "sensor.max_consecutive_failures", "must be greater than 0");
    }
    if config.led.led_count == 0 {
        invalid(errors, "led.led_count", "must be greater than 0");
    }
}

fn validate_emotional_state(config: &CompanionConfig, errors: &mut Vec<ConfigValidationError>) {
    let es = &config.emotional_state;
    let (upper, lower) = (es.upper_threshold, es.lower_threshold);

    if !upper.is_finite() || !lower.is_finite() || lower < 0.0 {
        invalid(
            errors,
            "emotional_state.thresholds",
            "thresholds must be finite and non-negative",
        );
    } else {
        match es.metric {
            MetricKind::CountInWindow if lower > upper => invalid(
                errors,
                "emotional_state.lower_threshold",
                format!("{} must be <= upper_threshold {}", lower, upper),
            ),
            MetricKind::TouchesPerMinute if lower >= upper => invalid(
                errors,
                "emotional_state.lower_threshold",
                format!("{} must be < upper_threshold {}", lower, upper),
            ),
            _ => {}
        }
    }

    if es.metric_window_secs == 0 {
        invalid(errors, "emotional_state.metric_window_secs", "must be greater than 0");
    }
    if es.metric_window_secs > config.touch_history.window_secs {
        invalid(
            errors,
            "emotional_state.metric_window_secs",
            format!(
                "{} exceeds touch_history.window_secs {}",
                es.metric_window_secs, config.touch_history.window_secs
            ),
        );
    }
    if es.transition_steps == 0 {
        invalid(errors, "emotional_state.transition_steps", "must be greater than 0");
    }
    if es.sad_color == es.glad_color {
        invalid(
            errors,
            "emotional_state.glad_color",
            "sad and glad colors must differ",
        );
    }
}

fn validate_intervals(config: &CompanionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.emotional_state.evaluation_interval_secs == 0 {
        invalid(errors, "emotional_state.evaluation_interval_secs", "must be greater than 0");
    }
    if config.touch_history.window_secs == 0 {
        invalid(errors, "touch_history.window_secs", "must be greater than 0");
    }
    if config.touch_history.day_retention_days == 0 {
        invalid(errors, "touch_history.day_retention_days", "must be greater than 0");
    }
    if config.led.shimmer_interval_ms == 0 {
        invalid(errors, "led.shimmer_interval_ms", "must be greater than 0");
    }
    if config.statistics.update_interval_secs == 0 {
        invalid(errors, "statistics.update_interval_secs", "must be greater than 0");
    }
    for (period, ttl) in config.statistics.cache_ttl.entries() {
        if ttl == 0 {
            invalid(
                errors,
                &format!("statistics.cache_ttl.{}", period),
                "must be greater than 0",
            );
        }
    }
    if config.notifications.queue_capacity == 0 {
        invalid(errors, "notifications.queue_capacity", "must be greater than 0");
    }
    if config.notifications.keep_alive_secs == 0 {
        invalid(errors, "notifications.keep_alive_secs", "must be greater than 0");
    }
    if config.persistence.save_interval_secs == 0 {
        invalid(errors, "persistence.save_interval_secs", "must be greater than 0");
    }
}
