// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section of `companion.toml`. Every section is
//! `#[serde(default)]`, so an empty file (or no file) yields the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub system: SystemConfig,
    pub api: ApiConfig,
    pub sensor: SensorConfig,
    pub touch_history: TouchHistoryConfig,
    pub emotional_state: EmotionalStateConfig,
    pub led: LedConfig,
    pub statistics: StatisticsConfig,
    pub notifications: NotificationsConfig,
    pub persistence: PersistenceConfig,
}

impl CompanionConfig {
    /// Runtime snapshot file inside the data directory
    pub fn state_file_path(&self) -> PathBuf {
        self.system.data_dir.join(&self.persistence.state_file)
    }

    /// Event journal file, or `None` when journaling is disabled
    pub fn journal_file_path(&self) -> Option<PathBuf> {
        self.persistence
            .journal_enabled
            .then(|| self.system.data_dir.join(&self.persistence.journal_file))
    }
}

/// Deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" | "testing" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub environment: Environment,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            environment: Environment::Development,
        }
    }
}

/// HTTP query API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Enables `POST /api/emotional-state/set/{state}`
    pub allow_manual_override: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            allow_manual_override: true,
        }
    }
}

/// Touch sensor polling and retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub channel_count: u8,
    pub poll_interval_ms: u64,
    /// Consecutive read failures that trigger re-initialization
    pub max_consecutive_failures: u32,
    /// Failures further apart than this do not count as consecutive
    pub failure_window_secs: u64,
    /// Back-off after a failed re-initialization
    pub cooldown_secs: u64,
    /// Pause after a single failed read
    pub retry_delay_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            channel_count: 12,
            poll_interval_ms: 10,
            max_consecutive_failures: 5,
            failure_window_secs: 10,
            cooldown_secs: 10,
            retry_delay_ms: 100,
        }
    }
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Sliding window and day-bucket retention
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TouchHistoryConfig {
    pub window_secs: u64,
    pub day_retention_days: u32,
}

impl Default for TouchHistoryConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            day_retention_days: 30,
        }
    }
}

/// Scalar fed to the emotional state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Raw touch count inside `metric_window_secs`
    #[default]
    CountInWindow,
    /// Touches per minute averaged over `metric_window_secs`
    TouchesPerMinute,
}

/// Emotional state machine thresholds and state colors
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmotionalStateConfig {
    pub metric: MetricKind,
    pub metric_window_secs: u64,
    /// SAD -> GLAD when metric >= upper_threshold
    pub upper_threshold: f64,
    /// GLAD -> SAD when metric < lower_threshold
    pub lower_threshold: f64,
    pub evaluation_interval_secs: u64,
    pub sad_color: [u8; 3],
    pub glad_color: [u8; 3],
    pub transition_steps: u32,
    pub transition_duration_ms: u64,
}

impl Default for EmotionalStateConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::CountInWindow,
            metric_window_secs: 3600,
            upper_threshold: 20.0,
            lower_threshold: 3.0,
            evaluation_interval_secs: 10,
            sad_color: [0, 0, 255],
            glad_color: [255, 255, 0],
            transition_steps: 50,
            transition_duration_ms: 5000,
        }
    }
}

impl EmotionalStateConfig {
    pub fn metric_window(&self) -> Duration {
        Duration::from_secs(self.metric_window_secs)
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    /// Delay between two animation frames
    pub fn step_delay(&self) -> Duration {
        if self.transition_steps == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.transition_duration_ms / u64::from(self.transition_steps))
    }
}

/// LED strip configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedConfig {
    pub led_count: usize,
    /// Global brightness, 0-255
    pub brightness: u8,
    pub shimmer_interval_ms: u64,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            led_count: 16,
            brightness: 100,
            shimmer_interval_ms: 100,
        }
    }
}

impl LedConfig {
    pub fn shimmer_interval(&self) -> Duration {
        Duration::from_millis(self.shimmer_interval_ms)
    }
}

/// Cache TTL per statistics period, in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    pub minute: u64,
    pub hour: u64,
    pub today: u64,
    pub week: u64,
    pub month: u64,
    pub year: u64,
    pub all_time: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            minute: 10,
            hour: 60,
            today: 300,
            week: 900,
            month: 1800,
            year: 3600,
            all_time: 3600,
        }
    }
}

impl CacheTtlConfig {
    /// `(period name, ttl)` pairs in ascending period length
    pub fn entries(&self) -> [(&'static str, u64); 7] {
        [
            ("minute", self.minute),
            ("hour", self.hour),
            ("today", self.today),
            ("week", self.week),
            ("month", self.month),
            ("year", self.year),
            ("all_time", self.all_time),
        ]
    }
}

/// Statistics refresh and caching
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub update_interval_secs: u64,
    pub cache_ttl: CacheTtlConfig,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 10,
            cache_ttl: CacheTtlConfig::default(),
        }
    }
}

/// Live-update fan-out
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Bounded queue length per subscriber
    pub queue_capacity: usize,
    pub keep_alive_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            keep_alive_secs: 30,
        }
    }
}

/// Runtime snapshot and event journal
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub state_file: String,
    pub journal_enabled: bool,
    pub journal_file: String,
    pub save_interval_secs: u64,
    /// Most recent window timestamps written to the snapshot
    pub window_timestamps_kept: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: "app_state.json".to_string(),
            journal_enabled: true,
            journal_file: "touch_journal.jsonl".to_string(),
            save_interval_secs: 60,
            window_timestamps_kept: 1000,
        }
    }
}
