// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime state persistence (save/load)
//!
//! A small JSON document carrying the pipeline's in-memory counters across
//! restarts, so counts survive without replaying the event store.

use crate::emotional_state::EmotionalStateMachine;
use crate::touch_history::TouchHistory;
use crate::types::EmotionalState;
use crate::{Result, StateError};
use chrono::{DateTime, NaiveDate, Utc};
use companion_hal::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistent state snapshot (serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub total_touches: u64,
    pub daily_touches: BTreeMap<NaiveDate, u64>,
    pub window_timestamps: Vec<DateTime<Utc>>,
    pub current_state: EmotionalState,
    /// When `current_state` was entered
    #[serde(default)]
    pub state_since: Option<DateTime<Utc>>,
    pub last_color: Option<Rgb>,
    pub last_external_call: Option<DateTime<Utc>>,
}

impl RuntimeSnapshot {
    /// Capture the current pipeline state
    ///
    /// # Arguments
    /// * `timestamps_kept` - newest window timestamps to include
    pub fn capture(
        history: &TouchHistory,
        machine: &EmotionalStateMachine,
        last_color: Option<Rgb>,
        last_external_call: Option<DateTime<Utc>>,
        timestamps_kept: usize,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let info = machine.info();
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            total_touches: history.total_count(),
            daily_touches: history.daily_counts(),
            window_timestamps: history.window_timestamps(timestamps_kept),
            current_state: info.state,
            state_since: info.since,
            last_color,
            last_external_call,
        }
    }

    /// Push the snapshot back into fresh pipeline components
    pub fn restore_into(&self, history: &TouchHistory, machine: &EmotionalStateMachine) {
        history.restore(
            self.total_touches,
            self.daily_touches.clone(),
            self.window_timestamps.clone(),
        );
        machine.restore_state(self.current_state, self.state_since);
    }

    /// Save snapshot to file
    ///
    /// Written to a sibling temp file and renamed into place, so a crash
    /// mid-write leaves the previous snapshot intact.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_vec_pretty(self)?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = std::path::PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, encoded)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load snapshot from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let snapshot: RuntimeSnapshot = serde_json::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Load if present and readable; a missing or corrupt file yields `None`
    pub fn load_or_fresh(path: &Path) -> Option<Self> {
        if !path.exists() {
            info!(
                target: "companion-state-manager",
                "No runtime snapshot at {}, starting fresh",
                path.display()
            );
            return None;
        }
        match Self::load_from_file(path) {
            Ok(snapshot) => {
                info!(
                    target: "companion-state-manager",
                    "Loaded runtime snapshot from {} (total_touches={}, state={})",
                    path.display(),
                    snapshot.total_touches,
                    snapshot.current_state
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    target: "companion-state-manager",
                    "Ignoring unreadable runtime snapshot {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotional_state::StateMachineConfig;
    use crate::touch_history::TouchHistoryConfig;
    use crate::types::TouchEvent;
    use chrono::TimeZone;
    use companion_hal::{Clock, ManualClock};
    use std::sync::Arc;

    #[test]
    fn test_snapshot_roundtrip() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let history = TouchHistory::new(TouchHistoryConfig::default(), clock.clone()).unwrap();
        let machine = EmotionalStateMachine::new(StateMachineConfig::default(), clock.clone()).unwrap();
        for _ in 0..7 {
            history.record(&TouchEvent::new(2, clock.now(), 0.2).unwrap());
        }
        let entered = machine.force_state(EmotionalState::Glad).unwrap().timestamp;

        let snapshot = RuntimeSnapshot::capture(
            &history,
            &machine,
            Some(Rgb::new(255, 255, 0)),
            None,
            1000,
            clock.now(),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("app_state.json");
        snapshot.save_to_file(&path).unwrap();

        let loaded = RuntimeSnapshot::load_from_file(&path).unwrap();
        assert_eq!(loaded, snapshot);

        let fresh_history = TouchHistory::new(TouchHistoryConfig::default(), clock.clone()).unwrap();
        let fresh_machine = EmotionalStateMachine::new(StateMachineConfig::default(), clock).unwrap();
        loaded.restore_into(&fresh_history, &fresh_machine);
        assert_eq!(fresh_history.total_count(), 7);
        assert_eq!(fresh_machine.current_state(), EmotionalState::Glad);
        assert_eq!(fresh_machine.info().since, Some(entered));
    }

    #[test]
    fn corrupt_or_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_state.json");
        assert!(RuntimeSnapshot::load_or_fresh(&path).is_none());

        std::fs::write(&path, b"{not json").unwrap();
        assert!(RuntimeSnapshot::load_or_fresh(&path).is_none());
        assert!(matches!(
            RuntimeSnapshot::load_from_file(&path),
            Err(StateError::Serialization(_))
        ));
    }
}
