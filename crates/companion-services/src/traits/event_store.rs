// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Event store trait.

Durable record of touches and state transitions, plus the aggregate queries
statistics are computed from.
*/

use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use companion_state_manager::{EmotionalState, StateChange, TouchEvent};

/// Append-only event store (transport-agnostic)
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a completed touch
    ///
    /// # Arguments
    /// * `event` - The touch; its end time becomes the record timestamp
    /// * `state` - Device state when the touch was recorded
    ///
    async fn append_touch(
        &self,
        event: &TouchEvent,
        state: EmotionalState,
    ) -> ServiceResult<TouchRecord>;

    /// Persist a state transition
    async fn append_state_change(&self, change: &StateChange) -> ServiceResult<StateChangeRecord>;

    /// Number of touches matching `filter`
    async fn count_touches(&self, filter: &TouchFilter) -> ServiceResult<u64>;

    /// Mean touch duration in milliseconds, `0.0` when nothing matches
    async fn average_duration_ms(&self, filter: &TouchFilter) -> ServiceResult<f64>;

    /// Seconds spent in each state inside `range`
    ///
    /// The state in effect at the end of the record is counted up to the
    /// range end (or now when the range is open).
    async fn state_durations(&self, range: &TimeRange) -> ServiceResult<StateDurations>;

    /// Matching touches, newest first
    async fn touch_events(
        &self,
        filter: &TouchFilter,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<TouchRecord>>;

    /// Recorded transitions, newest first
    async fn state_history(&self, limit: usize, offset: usize)
        -> ServiceResult<Vec<StateChangeRecord>>;

    /// Drop touches older than `cutoff`; returns how many were removed
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize>;
}
