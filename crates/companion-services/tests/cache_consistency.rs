// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-through caching and invalidate-on-write through the service layer.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use companion_hal::{Clock, ManualClock};
use companion_services::{
    EventStore, InMemoryEventStore, Period, ServiceError, ServiceResult, StateChangeRecord,
    StateDurations, StatisticsService, StatisticsServiceImpl, StatsCache, TimeRange, TouchFilter,
    TouchRecord, TtlTable,
};
use companion_state_manager::{
    EmotionalState, EmotionalStateMachine, StateChange, StateMachineConfig, TouchEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a real store, counting aggregate queries and optionally failing them
struct InstrumentedStore {
    inner: InMemoryEventStore,
    count_queries: AtomicUsize,
    fail_queries: AtomicBool,
}

impl InstrumentedStore {
    fn check(&self) -> ServiceResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ServiceError::Storage("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InstrumentedStore {
    async fn append_touch(
        &self,
        event: &TouchEvent,
        state: EmotionalState,
    ) -> ServiceResult<TouchRecord> {
        self.inner.append_touch(event, state).await
    }

    async fn append_state_change(&self, change: &StateChange) -> ServiceResult<StateChangeRecord> {
        self.inner.append_state_change(change).await
    }

    async fn count_touches(&self, filter: &TouchFilter) -> ServiceResult<u64> {
        self.count_queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.count_touches(filter).await
    }

    async fn average_duration_ms(&self, filter: &TouchFilter) -> ServiceResult<f64> {
        self.check()?;
        self.inner.average_duration_ms(filter).await
    }

    async fn state_durations(&self, range: &TimeRange) -> ServiceResult<StateDurations> {
        self.check()?;
        self.inner.state_durations(range).await
    }

    async fn touch_events(
        &self,
        filter: &TouchFilter,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<TouchRecord>> {
        self.check()?;
        self.inner.touch_events(filter, limit, offset).await
    }

    async fn state_history(
        &self,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<StateChangeRecord>> {
        self.inner.state_history(limit, offset).await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        self.inner.prune_before(cutoff).await
    }
}

fn setup() -> (Arc<ManualClock>, Arc<InstrumentedStore>, StatisticsServiceImpl) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap(),
    ));
    let store = Arc::new(InstrumentedStore {
        inner: InMemoryEventStore::new(clock.clone()),
        count_queries: AtomicUsize::new(0),
        fail_queries: AtomicBool::new(false),
    });
    let cache = Arc::new(StatsCache::new(TtlTable::default(), clock.clone()));
    let machine = Arc::new(
        EmotionalStateMachine::new(StateMachineConfig::default(), clock.clone()).unwrap(),
    );
    let service = StatisticsServiceImpl::new(store.clone(), cache, machine, clock.clone());
    (clock, store, service)
}

#[tokio::test]
async fn repeated_reads_within_ttl_query_once_and_writes_force_a_requery() {
    let (clock, store, service) = setup();

    service.touch_count(Period::Today, None).await;
    service.touch_count(Period::Today, None).await;
    assert_eq!(store.count_queries.load(Ordering::SeqCst), 1);

    let event = TouchEvent::new(2, clock.now(), 0.2).unwrap();
    service.record_touch(&event, EmotionalState::Sad).await.unwrap();

    let after_write = service.touch_count(Period::Today, None).await;
    assert_eq!(store.count_queries.load(Ordering::SeqCst), 2);
    assert_eq!(after_write.value, 1);
    assert!(!after_write.cached);
}

#[tokio::test]
async fn failed_aggregates_yield_zero_and_recover_without_stale_cache() {
    let (clock, store, service) = setup();
    let event = TouchEvent::new(0, clock.now(), 0.4).unwrap();
    service.record_touch(&event, EmotionalState::Glad).await.unwrap();

    store.fail_queries.store(true, Ordering::SeqCst);
    assert_eq!(service.touch_count(Period::AllTime, None).await.value, 0);
    assert_eq!(service.average_duration_ms(Period::AllTime, None).await.value, 0.0);
    assert_eq!(
        service.state_durations(Period::Today).await.value,
        StateDurations::default()
    );
    assert!(service
        .touch_events(TouchFilter::default(), 10, 0)
        .await
        .is_err());

    store.fail_queries.store(false, Ordering::SeqCst);
    assert_eq!(service.touch_count(Period::AllTime, None).await.value, 1);
    assert_eq!(service.average_duration_ms(Period::AllTime, None).await.value, 400.0);
}
