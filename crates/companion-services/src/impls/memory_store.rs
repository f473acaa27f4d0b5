// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
In-memory event store with an optional JSON-lines journal.

Every append is written to the journal before it becomes visible, and the
journal is replayed when the store is opened. Prunes are journaled too, and
a journal that contained prunes or unreadable lines is compacted on open.
*/

use crate::traits::EventStore;
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use companion_hal::Clock;
use companion_state_manager::{EmotionalState, StateChange, TouchEvent};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalEntry {
    Touch(TouchRecord),
    StateChange(StateChangeRecord),
    Prune { cutoff: DateTime<Utc> },
}

struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    fn open_append(path: &Path) -> ServiceResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn append(&mut self, entry: &JournalEntry) -> ServiceResult<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

struct StoreData {
    touches: Vec<TouchRecord>,
    changes: Vec<StateChangeRecord>,
    next_touch_id: u64,
    next_change_id: u64,
    /// State assumed before the first recorded transition, and since when
    initial_state: EmotionalState,
    tracked_since: DateTime<Utc>,
}

impl StoreData {
    fn new(since: DateTime<Utc>) -> Self {
        Self {
            touches: Vec::new(),
            changes: Vec::new(),
            next_touch_id: 1,
            next_change_id: 1,
            initial_state: EmotionalState::default(),
            tracked_since: since,
        }
    }

    fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Touch(record) => {
                self.next_touch_id = self.next_touch_id.max(record.id + 1);
                self.touches.push(record);
            }
            JournalEntry::StateChange(record) => {
                self.next_change_id = self.next_change_id.max(record.id + 1);
                self.changes.push(record);
            }
            JournalEntry::Prune { cutoff } => {
                self.touches.retain(|t| t.timestamp >= cutoff);
            }
        }
    }

    fn entries(&self) -> impl Iterator<Item = JournalEntry> + '_ {
        let touches = self.touches.iter().cloned().map(JournalEntry::Touch);
        let changes = self.changes.iter().cloned().map(JournalEntry::StateChange);
        touches.chain(changes)
    }
}

/// [`EventStore`] backed by vectors, optionally journaled to disk
pub struct InMemoryEventStore {
    data: RwLock<StoreData>,
    journal: Option<Mutex<Journal>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventStore {
    /// Memory-only store; nothing survives a restart
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: RwLock::new(StoreData::new(clock.now())),
            journal: None,
            clock,
        }
    }

    /// Open (or create) a journaled store at `path`, replaying its contents
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> ServiceResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut data = StoreData::new(clock.now());
        let mut needs_compaction = false;

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let mut skipped = 0usize;
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalEntry>(&line) {
                    Ok(entry) => {
                        needs_compaction |= matches!(entry, JournalEntry::Prune { .. });
                        data.apply(entry);
                    }
                    Err(e) => {
                        skipped += 1;
                        warn!(
                            target: "companion-services",
                            "Skipping unreadable journal line {} in {}: {}",
                            line_no + 1,
                            path.display(),
                            e
                        );
                    }
                }
            }
            needs_compaction |= skipped > 0;

            let first_touch = data.touches.iter().map(|t| t.timestamp).min();
            let first_change = data.changes.first().map(|c| c.timestamp);
            if let Some(first) = [first_touch, first_change].into_iter().flatten().min() {
                data.tracked_since = data.tracked_since.min(first);
            }
            if let Some(first) = data.changes.first() {
                data.initial_state = first.old_state;
            }

            info!(
                target: "companion-services",
                "Replayed journal {}: {} touches, {} state changes",
                path.display(),
                data.touches.len(),
                data.changes.len()
            );
        }

        if needs_compaction {
            compact(path, &data)?;
        }

        Ok(Self {
            data: RwLock::new(data),
            journal: Some(Mutex::new(Journal::open_append(path)?)),
            clock,
        })
    }

    /// Journal path, `None` for a memory-only store
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.journal.as_ref().map(|j| j.lock().path.clone())
    }

    /// State in effect before the first recorded transition
    ///
    /// Ignored once a transition has been recorded.
    pub fn set_initial_state(&self, state: EmotionalState) {
        let mut data = self.data.write();
        if data.changes.is_empty() {
            data.initial_state = state;
        }
    }

    /// Most recent recorded transition
    pub fn last_state_change(&self) -> Option<StateChangeRecord> {
        self.data.read().changes.last().cloned()
    }

    pub fn touch_len(&self) -> usize {
        self.data.read().touches.len()
    }

    fn write_journal(&self, entry: &JournalEntry) -> ServiceResult<()> {
        match &self.journal {
            Some(journal) => journal.lock().append(entry),
            None => Ok(()),
        }
    }
}

/// Rewrite the journal from `data` (temp file + rename)
fn compact(path: &Path, data: &StoreData) -> ServiceResult<()> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for entry in data.entries() {
            serde_json::to_writer(&mut writer, &entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!(target: "companion-services", "Compacted journal {}", path.display());
    Ok(())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_touch(
        &self,
        event: &TouchEvent,
        state: EmotionalState,
    ) -> ServiceResult<TouchRecord> {
        let mut data = self.data.write();
        let record = TouchRecord {
            id: data.next_touch_id,
            sensor_id: event.sensor_channel(),
            timestamp: event.ended_at(),
            duration_ms: event.duration_ms().round() as u64,
            state,
        };
        self.write_journal(&JournalEntry::Touch(record.clone()))?;
        data.next_touch_id += 1;
        data.touches.push(record.clone());
        Ok(record)
    }

    async fn append_state_change(&self, change: &StateChange) -> ServiceResult<StateChangeRecord> {
        let mut data = self.data.write();
        let record = StateChangeRecord::from_change(data.next_change_id, change);
        self.write_journal(&JournalEntry::StateChange(record.clone()))?;
        data.next_change_id += 1;
        data.changes.push(record.clone());
        Ok(record)
    }

    async fn count_touches(&self, filter: &TouchFilter) -> ServiceResult<u64> {
        let data = self.data.read();
        Ok(data.touches.iter().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn average_duration_ms(&self, filter: &TouchFilter) -> ServiceResult<f64> {
        let data = self.data.read();
        let (sum, n) = data
            .touches
            .iter()
            .filter(|t| filter.matches(t))
            .fold((0u64, 0u64), |(sum, n), t| (sum + t.duration_ms, n + 1));
        if n == 0 {
            return Ok(0.0);
        }
        Ok(sum as f64 / n as f64)
    }

    async fn state_durations(&self, range: &TimeRange) -> ServiceResult<StateDurations> {
        let now = self.clock.now();
        let end = range.end.map_or(now, |e| e.min(now));
        let data = self.data.read();

        let mut millis = [0i64; 2];
        let mut add = |state: EmotionalState, from: DateTime<Utc>, to: DateTime<Utc>| {
            let from = range.start.map_or(from, |s| from.max(s));
            let to = to.min(end);
            if to > from {
                millis[state as usize] += to.signed_duration_since(from).num_milliseconds();
            }
        };

        let mut state = data.initial_state;
        let mut since = data.tracked_since;
        for change in &data.changes {
            add(state, since, change.timestamp);
            state = change.new_state;
            since = since.max(change.timestamp);
        }
        add(state, since, end);

        let mut durations = StateDurations::default();
        for s in EmotionalState::ALL {
            let ms = millis[s as usize];
            durations.add(s, ((ms + 500) / 1000) as u64);
        }
        Ok(durations)
    }

    async fn touch_events(
        &self,
        filter: &TouchFilter,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<TouchRecord>> {
        let data = self.data.read();
        let mut matching: Vec<&TouchRecord> =
            data.touches.iter().filter(|t| filter.matches(t)).collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn state_history(
        &self,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<StateChangeRecord>> {
        let data = self.data.read();
        Ok(data
            .changes
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        let mut data = self.data.write();
        let before = data.touches.len();
        if !data.touches.iter().any(|t| t.timestamp < cutoff) {
            return Ok(0);
        }
        self.write_journal(&JournalEntry::Prune { cutoff })?;
        data.touches.retain(|t| t.timestamp >= cutoff);
        let removed = before - data.touches.len();
        info!(
            target: "companion-services",
            "Pruned {} touch events older than {}", removed, cutoff
        );
        Ok(removed)
    }
}
