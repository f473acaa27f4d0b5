// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Statistics service trait.

Writes go to the event store and invalidate the affected cache entries;
aggregate reads go through the statistics cache and never fail (a failed
query yields a zero value and is logged).
*/

use crate::cache::Cached;
use crate::types::*;
use async_trait::async_trait;
use companion_state_manager::{EmotionalState, StateChange, TouchEvent};
use std::collections::BTreeMap;
use std::time::Duration;

/// Statistics and event-history service (transport-agnostic)
#[async_trait]
pub trait StatisticsService: Send + Sync {
    /// Store a touch and invalidate touch-count and duration statistics
    async fn record_touch(
        &self,
        event: &TouchEvent,
        state: EmotionalState,
    ) -> ServiceResult<TouchRecord>;

    /// Store a transition and invalidate state-duration statistics
    async fn record_state_change(&self, change: &StateChange) -> ServiceResult<StateChangeRecord>;

    /// Touch count for `period`
    ///
    /// Per-sensor counts bypass the cache.
    async fn touch_count(&self, period: Period, sensor_id: Option<u8>) -> Cached<u64>;

    /// Touch count for every period
    async fn touch_counts(&self) -> BTreeMap<Period, u64>;

    /// Average touch duration in milliseconds for `period`
    async fn average_duration_ms(&self, period: Period, sensor_id: Option<u8>) -> Cached<f64>;

    /// Time spent in each state during `period`
    async fn state_durations(&self, period: Period) -> Cached<StateDurations>;

    /// Stored touches, newest first
    ///
    /// # Errors
    /// * `ServiceError::Storage` - The event store could not be read
    ///
    async fn touch_events(
        &self,
        filter: TouchFilter,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<TouchRecord>>;

    /// Stored transitions, newest first
    async fn state_history(
        &self,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<StateChangeRecord>>;

    /// Current aggregate view, published as `statistics_update`
    async fn snapshot(&self) -> StatisticsSnapshot;

    /// Delete touches older than `retention` and drop every cached value
    async fn prune(&self, retention: Duration) -> ServiceResult<usize>;
}
