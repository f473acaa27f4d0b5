// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Data Transfer Objects (DTOs) for the service layer.

These types are transport-agnostic and serialize to the JSON shapes the
query API and the live-update stream expose.
*/

use chrono::{DateTime, Utc};
use companion_state_manager::{EmotionalState, StateChange, TransitionTrigger};
use serde::{Deserialize, Serialize};

// ============================================================================
// QUERY FILTERS
// ============================================================================

/// Inclusive time range; `None` bounds are open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Touch query filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchFilter {
    pub range: TimeRange,
    pub sensor_id: Option<u8>,
}

impl TouchFilter {
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            range,
            sensor_id: None,
        }
    }

    pub fn with_sensor(mut self, sensor_id: Option<u8>) -> Self {
        self.sensor_id = sensor_id;
        self
    }

    pub fn matches(&self, record: &TouchRecord) -> bool {
        self.range.contains(record.timestamp)
            && self.sensor_id.map_or(true, |id| record.sensor_id == id)
    }
}

// ============================================================================
// STORED RECORDS
// ============================================================================

/// A persisted touch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchRecord {
    pub id: u64,
    pub sensor_id: u8,
    /// When the touch ended
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// Device state when the touch was recorded
    pub state: EmotionalState,
}

/// A persisted state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeRecord {
    pub id: u64,
    pub old_state: EmotionalState,
    pub new_state: EmotionalState,
    pub timestamp: DateTime<Utc>,
    pub trigger: TransitionTrigger,
}

impl StateChangeRecord {
    pub fn from_change(id: u64, change: &StateChange) -> Self {
        Self {
            id,
            old_state: change.old_state,
            new_state: change.new_state,
            timestamp: change.timestamp,
            trigger: change.trigger,
        }
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Whole seconds spent in each state; both states are always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDurations {
    pub sad: u64,
    pub glad: u64,
}

impl StateDurations {
    pub fn get(&self, state: EmotionalState) -> u64 {
        match state {
            EmotionalState::Sad => self.sad,
            EmotionalState::Glad => self.glad,
        }
    }

    pub(crate) fn add(&mut self, state: EmotionalState, secs: u64) {
        match state {
            EmotionalState::Sad => self.sad += secs,
            EmotionalState::Glad => self.glad += secs,
        }
    }
}

/// Touch counts published with every statistics update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchCounts {
    pub all_time: u64,
    pub today: u64,
    pub hour: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalStateSummary {
    pub current: EmotionalState,
    /// Durations since local midnight
    pub durations: StateDurations,
}

/// Payload of the `statistics_update` topic and `/api/statistics/all`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub touch_count: TouchCounts,
    /// Average touch duration over all time, in milliseconds, 2 decimals
    pub avg_duration: f64,
    pub emotional_state: EmotionalStateSummary,
    pub timestamp: DateTime<Utc>,
}
