// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Read-through statistics cache.

Entries are keyed by `(StatType, Period)` and live for the period's TTL.
Writes to the event store invalidate every entry of the affected stat type.

Each stat type carries an epoch that `invalidate` bumps. A value computed
while an invalidation happened is returned to its caller but not stored, so
a slow query can never re-insert a value the write already made stale.
*/

use crate::types::{Period, ServiceResult, StateDurations};
use ahash::AHashMap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use companion_hal::Clock;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Aggregate kinds held in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    TouchCount,
    AvgDuration,
    StateDuration,
}

impl StatType {
    pub const ALL: [StatType; 3] = [
        StatType::TouchCount,
        StatType::AvgDuration,
        StatType::StateDuration,
    ];
}

/// A cached aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u64),
    Average(f64),
    Durations(StateDurations),
}

impl StatValue {
    /// Safe default returned when the underlying query fails
    pub fn zero(stat: StatType) -> Self {
        match stat {
            StatType::TouchCount => StatValue::Count(0),
            StatType::AvgDuration => StatValue::Average(0.0),
            StatType::StateDuration => StatValue::Durations(StateDurations::default()),
        }
    }

    pub fn as_count(&self) -> u64 {
        match self {
            StatValue::Count(n) => *n,
            StatValue::Average(avg) => avg.max(0.0) as u64,
            StatValue::Durations(d) => d.sad + d.glad,
        }
    }

    pub fn as_average(&self) -> f64 {
        match self {
            StatValue::Count(n) => *n as f64,
            StatValue::Average(avg) => *avg,
            StatValue::Durations(_) => 0.0,
        }
    }

    pub fn as_durations(&self) -> StateDurations {
        match self {
            StatValue::Durations(d) => *d,
            _ => StateDurations::default(),
        }
    }
}

/// A value plus whether it was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cached<T> {
    pub value: T,
    pub cached: bool,
}

impl<T> Cached<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            cached: false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            value: f(self.value),
            cached: self.cached,
        }
    }
}

/// TTL per period
#[derive(Debug, Clone)]
pub struct TtlTable {
    ttls: AHashMap<Period, Duration>,
}

impl TtlTable {
    /// Build from `(period, ttl)` pairs; unspecified periods keep the default
    pub fn new(entries: impl IntoIterator<Item = (Period, Duration)>) -> Self {
        let mut table = Self::default();
        for (period, ttl) in entries {
            table.ttls.insert(period, ttl);
        }
        table
    }

    pub fn ttl(&self, period: Period) -> Duration {
        self.ttls
            .get(&period)
            .copied()
            .unwrap_or(Duration::from_secs(300))
    }
}

impl Default for TtlTable {
    /// Short periods change quickly and get short TTLs
    fn default() -> Self {
        let secs = [
            (Period::Minute, 10),
            (Period::Hour, 60),
            (Period::Today, 300),
            (Period::Week, 900),
            (Period::Month, 1800),
            (Period::Year, 3600),
            (Period::AllTime, 3600),
        ];
        Self {
            ttls: secs
                .into_iter()
                .map(|(p, s)| (p, Duration::from_secs(s)))
                .collect(),
        }
    }
}

/// Counters reported by `/health`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: StatValue,
    computed_at: DateTime<Utc>,
    ttl: ChronoDuration,
}

#[derive(Default)]
struct CacheInner {
    entries: AHashMap<(StatType, Period), CacheEntry>,
    epochs: AHashMap<StatType, u64>,
}

impl CacheInner {
    fn epoch(&self, stat: StatType) -> u64 {
        self.epochs.get(&stat).copied().unwrap_or(0)
    }
}

/// TTL cache in front of the event store aggregates
pub struct StatsCache {
    inner: RwLock<CacheInner>,
    ttl: TtlTable,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl StatsCache {
    pub fn new(ttl: TtlTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn ttl_table(&self) -> &TtlTable {
        &self.ttl
    }

    /// Cached value if present and `now - computed_at <= ttl`
    pub fn get(&self, stat: StatType, period: Period) -> Option<StatValue> {
        let now = self.clock.now();
        let inner = self.inner.read();
        inner
            .entries
            .get(&(stat, period))
            .filter(|entry| now.signed_duration_since(entry.computed_at) <= entry.ttl)
            .map(|entry| entry.value)
    }

    /// Return the cached value or compute, store and return it
    ///
    /// A failed computation is logged, yields [`StatValue::zero`] and is not
    /// cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        stat: StatType,
        period: Period,
        compute: F,
    ) -> Cached<StatValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<StatValue>>,
    {
        if let Some(value) = self.get(stat, period) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(target: "companion-services", "Cache hit {:?}/{}", stat, period);
            return Cached {
                value,
                cached: true,
            };
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed_at = self.clock.now();
        let epoch = self.inner.read().epoch(stat);

        match compute().await {
            Ok(value) => {
                self.store(stat, period, value, computed_at, epoch);
                Cached::fresh(value)
            }
            Err(e) => {
                error!(
                    target: "companion-services",
                    "Error calculating statistic {:?}/{}: {}", stat, period, e
                );
                Cached::fresh(StatValue::zero(stat))
            }
        }
    }

    fn store(
        &self,
        stat: StatType,
        period: Period,
        value: StatValue,
        computed_at: DateTime<Utc>,
        epoch: u64,
    ) {
        let mut inner = self.inner.write();
        if inner.epoch(stat) != epoch {
            debug!(
                target: "companion-services",
                "Discarding {:?}/{}: invalidated while computing", stat, period
            );
            return;
        }
        let ttl = ChronoDuration::from_std(self.ttl.ttl(period)).unwrap_or(ChronoDuration::MAX);
        inner.entries.insert(
            (stat, period),
            CacheEntry {
                value,
                computed_at,
                ttl,
            },
        );
    }

    /// Remove matching entries; `None` matches everything
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, stat: Option<StatType>, period: Option<Period>) -> usize {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|(s, p), _| {
            let stat_matches = stat.map_or(true, |want| *s == want);
            let period_matches = period.map_or(true, |want| *p == want);
            !(stat_matches && period_matches)
        });

        let bumped: Vec<StatType> = match stat {
            Some(s) => vec![s],
            None => StatType::ALL.to_vec(),
        };
        for s in bumped {
            *inner.epochs.entry(s).or_insert(0) += 1;
        }

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        let removed = before - inner.entries.len();
        trace!(
            target: "companion-services",
            "Invalidated {} cache entries (stat={:?}, period={:?})", removed, stat, period
        );
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.read().entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}
