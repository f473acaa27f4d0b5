// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Time-windowed touch buffer plus lifetime and per-day counters.
//!
//! The window holds arrival timestamps in non-decreasing order. Eviction is
//! lazy: it happens on insert and on windowed reads, always from the front.
//! Lifetime and day counters are independent of the window.

use crate::types::TouchEvent;
use crate::{Result, StateError};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use companion_hal::Clock;
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Window horizon and day-bucket retention
#[derive(Debug, Clone)]
pub struct TouchHistoryConfig {
    /// Longest window any reader may ask for
    pub window: Duration,
    /// Day buckets older than this are dropped
    pub day_retention_days: u32,
}

impl Default for TouchHistoryConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            day_retention_days: 30,
        }
    }
}

#[derive(Debug, Default)]
struct HistoryInner {
    window: VecDeque<DateTime<Utc>>,
    total: u64,
    daily: BTreeMap<NaiveDate, u64>,
}

impl HistoryInner {
    fn evict_before(&mut self, cutoff: Option<DateTime<Utc>>) -> usize {
        let Some(cutoff) = cutoff else { return 0 };
        let mut evicted = 0;
        while self.window.front().is_some_and(|ts| *ts < cutoff) {
            self.window.pop_front();
            evicted += 1;
        }
        evicted
    }

    fn prune_days(&mut self, today: NaiveDate, retention_days: u32) {
        if let Some(oldest_kept) =
            today.checked_sub_signed(ChronoDuration::days(i64::from(retention_days)))
        {
            self.daily = self.daily.split_off(&oldest_kept);
        }
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

/// `now - duration`, or `None` when that predates the representable range
fn cutoff(now: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(to_chrono(duration))
}

fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// Sliding-window touch history
///
/// Single writer (the sensor pipeline), many readers. All access goes through
/// one `RwLock`; windowed reads take the write half because they evict.
pub struct TouchHistory {
    inner: RwLock<HistoryInner>,
    clock: Arc<dyn Clock>,
    horizon: Duration,
    day_retention_days: u32,
}

impl TouchHistory {
    pub fn new(config: TouchHistoryConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.window.is_zero() {
            return Err(StateError::InvalidConfig(
                "touch history window must be greater than zero".to_string(),
            ));
        }
        if config.day_retention_days == 0 {
            return Err(StateError::InvalidConfig(
                "day retention must be at least one day".to_string(),
            ));
        }
        Ok(Self {
            inner: RwLock::new(HistoryInner::default()),
            clock,
            horizon: config.window,
            day_retention_days: config.day_retention_days,
        })
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Record a completed touch
    ///
    /// The window stores the touch's end time, raised to the newest stored
    /// timestamp if the clock stepped backwards, so ordering never breaks.
    pub fn record(&self, event: &TouchEvent) {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        let arrived = match inner.window.back() {
            Some(last) if *last > event.ended_at() => *last,
            _ => event.ended_at(),
        };
        inner.window.push_back(arrived);
        inner.total += 1;
        *inner.daily.entry(local_date(arrived)).or_insert(0) += 1;

        let evicted = inner.evict_before(cutoff(now, self.horizon));
        inner.prune_days(local_date(now), self.day_retention_days);

        trace!(
            target: "companion-state-manager",
            "Recorded touch on channel {} (window={}, evicted={})",
            event.sensor_channel(),
            inner.window.len(),
            evicted
        );
    }

    /// Touches that arrived at or after `now - duration`
    ///
    /// Windows longer than the configured horizon see at most the horizon.
    pub fn count_since(&self, duration: Duration) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        inner.evict_before(cutoff(now, self.horizon));

        match cutoff(now, duration) {
            Some(bound) => {
                let older = inner.window.partition_point(|ts| *ts < bound);
                inner.window.len() - older
            }
            None => inner.window.len(),
        }
    }

    /// Average touches per minute over the last `duration`
    pub fn touches_per_minute(&self, duration: Duration) -> f64 {
        let minutes = duration.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        self.count_since(duration) as f64 / minutes
    }

    /// Lifetime touch count
    pub fn total_count(&self) -> u64 {
        self.inner.read().total
    }

    /// Touches recorded on the current local calendar day
    pub fn count_today(&self) -> u64 {
        let today = local_date(self.clock.now());
        let mut inner = self.inner.write();
        inner.prune_days(today, self.day_retention_days);
        inner.daily.get(&today).copied().unwrap_or(0)
    }

    /// Per-day counts still within retention
    pub fn daily_counts(&self) -> BTreeMap<NaiveDate, u64> {
        let today = local_date(self.clock.now());
        let mut inner = self.inner.write();
        inner.prune_days(today, self.day_retention_days);
        inner.daily.clone()
    }

    /// The newest `limit` window timestamps, oldest first
    pub fn window_timestamps(&self, limit: usize) -> Vec<DateTime<Utc>> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        inner.evict_before(cutoff(now, self.horizon));
        let skip = inner.window.len().saturating_sub(limit);
        inner.window.iter().skip(skip).copied().collect()
    }

    /// Replace all state with previously persisted values
    ///
    /// Timestamps are sorted and anything outside the horizon is dropped.
    pub fn restore(
        &self,
        total: u64,
        daily: BTreeMap<NaiveDate, u64>,
        mut window_timestamps: Vec<DateTime<Utc>>,
    ) {
        let now = self.clock.now();
        window_timestamps.sort_unstable();

        let mut inner = self.inner.write();
        inner.window = window_timestamps.into();
        inner.daily = daily;
        let window_len = inner.window.len() as u64;
        inner.total = total.max(window_len);
        inner.evict_before(cutoff(now, self.horizon));
        inner.prune_days(local_date(now), self.day_retention_days);
    }
}

impl std::fmt::Debug for TouchHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TouchHistory")
            .field("window_len", &inner.window.len())
            .field("total", &inner.total)
            .field("horizon", &self.horizon)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use companion_hal::ManualClock;

    fn setup(window_secs: u64) -> (TouchHistory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let history = TouchHistory::new(
            TouchHistoryConfig {
                window: Duration::from_secs(window_secs),
                day_retention_days: 30,
            },
            clock.clone(),
        )
        .unwrap();
        (history, clock)
    }

    fn touch_now(history: &TouchHistory, clock: &ManualClock) {
        let event = TouchEvent::new(0, clock.now(), 0.0).unwrap();
        history.record(&event);
    }

    #[test]
    fn rejects_zero_window() {
        let clock = Arc::new(ManualClock::default());
        let config = TouchHistoryConfig {
            window: Duration::ZERO,
            day_retention_days: 30,
        };
        assert!(TouchHistory::new(config, clock).is_err());
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let (history, clock) = setup(3600);
        touch_now(&history, &clock);
        clock.advance_secs(60);
        assert_eq!(history.count_since(Duration::from_secs(60)), 1);
        clock.advance(ChronoDuration::microseconds(1));
        assert_eq!(history.count_since(Duration::from_secs(60)), 0);
        // the longer window still sees it
        assert_eq!(history.count_since(Duration::from_secs(3600)), 1);
    }

    #[test]
    fn eviction_does_not_touch_lifetime_counters() {
        let (history, clock) = setup(60);
        for _ in 0..5 {
            touch_now(&history, &clock);
            clock.advance_secs(1);
        }
        clock.advance_secs(120);
        assert_eq!(history.count_since(Duration::from_secs(60)), 0);
        assert_eq!(history.total_count(), 5);
        assert_eq!(history.count_today(), 5);
    }

    #[test]
    fn backwards_clock_keeps_order() {
        let (history, clock) = setup(3600);
        touch_now(&history, &clock);
        clock.advance_secs(-10);
        touch_now(&history, &clock);
        let stamps = history.window_timestamps(10);
        assert_eq!(stamps.len(), 2);
        assert!(stamps[0] <= stamps[1]);
    }

    #[test]
    fn touches_per_minute() {
        let (history, clock) = setup(3600);
        for _ in 0..30 {
            touch_now(&history, &clock);
        }
        assert_eq!(history.touches_per_minute(Duration::from_secs(600)), 3.0);
        assert_eq!(history.touches_per_minute(Duration::ZERO), 0.0);
    }

    #[test]
    fn old_day_buckets_are_pruned() {
        let (history, clock) = setup(3600);
        touch_now(&history, &clock);
        clock.advance(ChronoDuration::days(31));
        touch_now(&history, &clock);
        assert_eq!(history.daily_counts().len(), 1);
        assert_eq!(history.total_count(), 2);
    }

    #[test]
    fn window_timestamps_returns_newest() {
        let (history, clock) = setup(3600);
        for _ in 0..5 {
            touch_now(&history, &clock);
            clock.advance_secs(1);
        }
        let newest = history.window_timestamps(2);
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[1], clock.now() - ChronoDuration::seconds(1));
    }

    #[test]
    fn restore_drops_expired_entries() {
        let (history, clock) = setup(60);
        let now = clock.now();
        history.restore(
            42,
            BTreeMap::new(),
            vec![now, now - ChronoDuration::seconds(600), now - ChronoDuration::seconds(5)],
        );
        assert_eq!(history.count_since(Duration::from_secs(60)), 2);
        assert_eq!(history.total_count(), 42);
    }
}
