// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion State Manager
//!
//! Runtime state owned by the touch pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   TouchHistory                      │  ← sliding window + lifetime/day counters
//! │   (RwLock, single writer)           │
//! └─────────────────────────────────────┘
//!           ↓ metric (count / touches per minute)
//! ┌─────────────────────────────────────┐
//! │   EmotionalStateMachine             │  ← SAD/GLAD with hysteresis
//! │   effects → observers               │  ← color retarget, live notifications
//! └─────────────────────────────────────┘
//!           ↓
//! ┌─────────────────────────────────────┐
//! │   RuntimeSnapshot                   │  ← JSON, survives restarts
//! └─────────────────────────────────────┘
//! ```
//!
//! Readers never hold references into internal structures; every accessor
//! returns owned values.

pub mod emotional_state;
pub mod observers;
pub mod persistence;
pub mod touch_history;
pub mod types;

pub use emotional_state::{EmotionalStateMachine, StateInfo, StateMachineConfig, StateMetric};
pub use observers::{observer_fn, ObserverError, ObserverId, StateEffect, StateObserver};
pub use persistence::{RuntimeSnapshot, SNAPSHOT_VERSION};
pub use touch_history::{TouchHistory, TouchHistoryConfig};
pub use types::{EmotionalState, StateChange, TouchEvent, TransitionTrigger, MAX_CHANNELS};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// State manager error types
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Touch channel outside the sensor's electrode range
    #[error("Invalid sensor channel {channel} (must be < {max})")]
    InvalidChannel { channel: u8, max: u8 },

    /// Negative, NaN or infinite touch duration
    #[error("Invalid touch duration: {0}")]
    InvalidDuration(String),

    /// Rejected construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown emotional state name
    #[error("Unknown emotional state '{0}'")]
    UnknownState(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot written by an incompatible version
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshotVersion { found: u32, expected: u32 },
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
