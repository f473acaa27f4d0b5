// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core value types: touches, emotional states, state-change records.

use crate::{Result, StateError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Electrodes on the touch controller
pub const MAX_CHANNELS: u8 = 12;

/// A completed touch on one channel
///
/// Created when a channel goes touched -> untouched; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    sensor_channel: u8,
    start_time: DateTime<Utc>,
    duration_secs: f64,
}

impl TouchEvent {
    pub fn new(sensor_channel: u8, start_time: DateTime<Utc>, duration_secs: f64) -> Result<Self> {
        if sensor_channel >= MAX_CHANNELS {
            return Err(StateError::InvalidChannel {
                channel: sensor_channel,
                max: MAX_CHANNELS,
            });
        }
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(StateError::InvalidDuration(duration_secs.to_string()));
        }
        Ok(Self {
            sensor_channel,
            start_time,
            duration_secs,
        })
    }

    /// Build from the two observed edges of a touch
    pub fn from_edges(sensor_channel: u8, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let elapsed = end - start;
        let micros = elapsed.num_microseconds().ok_or_else(|| {
            StateError::InvalidDuration(format!("{} overflows", elapsed))
        })?;
        Self::new(sensor_channel, start, micros as f64 / 1_000_000.0)
    }

    pub fn sensor_channel(&self) -> u8 {
        self.sensor_channel
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_secs * 1000.0
    }

    /// When the finger was lifted
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.start_time + Duration::microseconds((self.duration_secs * 1_000_000.0) as i64)
    }
}

/// The device's mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    #[default]
    Sad,
    Glad,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 2] = [EmotionalState::Sad, EmotionalState::Glad];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalState::Sad => "sad",
            EmotionalState::Glad => "glad",
        }
    }

    pub fn opposite(&self) -> EmotionalState {
        match self {
            EmotionalState::Sad => EmotionalState::Glad,
            EmotionalState::Glad => EmotionalState::Sad,
        }
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionalState {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sad" => Ok(EmotionalState::Sad),
            "glad" => Ok(EmotionalState::Glad),
            _ => Err(StateError::UnknownState(s.to_string())),
        }
    }
}

/// What caused a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Metric crossed a threshold
    Threshold { metric: f64 },
    /// `force_state` override
    Manual,
}

/// Immutable record of one state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub old_state: EmotionalState,
    pub new_state: EmotionalState,
    pub timestamp: DateTime<Utc>,
    pub trigger: TransitionTrigger,
}
