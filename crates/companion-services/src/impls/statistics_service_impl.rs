// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Statistics service implementation.
*/

use crate::cache::{Cached, StatType, StatValue, StatsCache};
use crate::traits::{EventStore, StatisticsService};
use crate::types::*;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use companion_hal::Clock;
use companion_state_manager::{EmotionalState, EmotionalStateMachine, StateChange, TouchEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Default implementation of [`StatisticsService`]
pub struct StatisticsServiceImpl {
    store: Arc<dyn EventStore>,
    cache: Arc<StatsCache>,
    machine: Arc<EmotionalStateMachine>,
    clock: Arc<dyn Clock>,
}

impl StatisticsServiceImpl {
    pub fn new(
        store: Arc<dyn EventStore>,
        cache: Arc<StatsCache>,
        machine: Arc<EmotionalStateMachine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            machine,
            clock,
        }
    }

    pub fn cache(&self) -> &Arc<StatsCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    fn filter(&self, period: Period, sensor_id: Option<u8>) -> TouchFilter {
        TouchFilter::in_range(period.range(self.clock.now())).with_sensor(sensor_id)
    }

    async fn cached_count(&self, period: Period) -> Cached<u64> {
        let filter = self.filter(period, None);
        self.cache
            .get_or_compute(StatType::TouchCount, period, || async {
                self.store.count_touches(&filter).await.map(StatValue::Count)
            })
            .await
            .map(|v| v.as_count())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl StatisticsService for StatisticsServiceImpl {
    async fn record_touch(
        &self,
        event: &TouchEvent,
        state: EmotionalState,
    ) -> ServiceResult<TouchRecord> {
        let record = self.store.append_touch(event, state).await?;
        self.cache.invalidate(Some(StatType::TouchCount), None);
        self.cache.invalidate(Some(StatType::AvgDuration), None);
        debug!(
            target: "companion-services",
            "Recorded touch #{} on sensor {} ({} ms)", record.id, record.sensor_id, record.duration_ms
        );
        Ok(record)
    }

    async fn record_state_change(&self, change: &StateChange) -> ServiceResult<StateChangeRecord> {
        let record = self.store.append_state_change(change).await?;
        self.cache.invalidate(Some(StatType::StateDuration), None);
        Ok(record)
    }

    async fn touch_count(&self, period: Period, sensor_id: Option<u8>) -> Cached<u64> {
        if sensor_id.is_none() {
            return self.cached_count(period).await;
        }

        let filter = self.filter(period, sensor_id);
        match self.store.count_touches(&filter).await {
            Ok(count) => Cached::fresh(count),
            Err(e) => {
                error!(target: "companion-services", "Error counting touches: {}", e);
                Cached::fresh(0)
            }
        }
    }

    async fn touch_counts(&self) -> BTreeMap<Period, u64> {
        let mut counts = BTreeMap::new();
        for period in Period::ALL {
            counts.insert(period, self.cached_count(period).await.value);
        }
        counts
    }

    async fn average_duration_ms(&self, period: Period, sensor_id: Option<u8>) -> Cached<f64> {
        let filter = self.filter(period, sensor_id);
        if sensor_id.is_some() {
            return match self.store.average_duration_ms(&filter).await {
                Ok(avg) => Cached::fresh(round2(avg)),
                Err(e) => {
                    error!(target: "companion-services", "Error averaging durations: {}", e);
                    Cached::fresh(0.0)
                }
            };
        }

        self.cache
            .get_or_compute(StatType::AvgDuration, period, || async {
                self.store
                    .average_duration_ms(&filter)
                    .await
                    .map(StatValue::Average)
            })
            .await
            .map(|v| round2(v.as_average()))
    }

    async fn state_durations(&self, period: Period) -> Cached<StateDurations> {
        let range = period.range(self.clock.now());
        self.cache
            .get_or_compute(StatType::StateDuration, period, || async {
                self.store
                    .state_durations(&range)
                    .await
                    .map(StatValue::Durations)
            })
            .await
            .map(|v| v.as_durations())
    }

    async fn touch_events(
        &self,
        filter: TouchFilter,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<TouchRecord>> {
        self.store.touch_events(&filter, limit, offset).await
    }

    async fn state_history(
        &self,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<StateChangeRecord>> {
        self.store.state_history(limit, offset).await
    }

    async fn snapshot(&self) -> StatisticsSnapshot {
        let touch_count = TouchCounts {
            all_time: self.cached_count(Period::AllTime).await.value,
            today: self.cached_count(Period::Today).await.value,
            hour: self.cached_count(Period::Hour).await.value,
        };
        let avg_duration = self.average_duration_ms(Period::AllTime, None).await.value;
        let durations = self.state_durations(Period::Today).await.value;

        StatisticsSnapshot {
            touch_count,
            avg_duration,
            emotional_state: EmotionalStateSummary {
                current: self.machine.current_state(),
                durations,
            },
            timestamp: self.clock.now(),
        }
    }

    async fn prune(&self, retention: Duration) -> ServiceResult<usize> {
        let retention = ChronoDuration::from_std(retention)
            .map_err(|e| ServiceError::InvalidInput(format!("retention: {}", e)))?;
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return Ok(0);
        };
        let removed = self.store.prune_before(cutoff).await?;
        if removed > 0 {
            self.cache.invalidate(None, None);
        }
        Ok(removed)
    }
}
