// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Companion Service Layer

The application boundary between the touch pipeline, the HTTP adapter and
the event store.

## Architecture

```text
┌─────────────────────────────────────────────────────────────────┐
│                        ADAPTERS                                  │
│  runtime pipeline (writes), axum query API (reads)               │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│              SERVICE LAYER (This Crate)                          │
│  • StatisticsService - record events, cached aggregates         │
│  • StatsCache        - (stat, period) TTL cache                 │
└────────────────────────────┬────────────────────────────────────┘
                             ↓
┌─────────────────────────────────────────────────────────────────┐
│                     EVENT STORE                                  │
│  EventStore trait, InMemoryEventStore (+ JSON-lines journal)     │
└─────────────────────────────────────────────────────────────────┘
```

Aggregate reads never fail: a failed query is logged and yields zero.
Every write through [`StatisticsService`] invalidates the cache entries of
the stat types it can affect.
*/

pub mod cache;
pub mod impls;
pub mod traits;
pub mod types;

pub use cache::{CacheStats, Cached, StatType, StatValue, StatsCache, TtlTable};
pub use impls::{InMemoryEventStore, StatisticsServiceImpl};
pub use traits::{EventStore, StatisticsService};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
