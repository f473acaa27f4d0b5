// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion - a touch-driven mood light
//!
//! A capacitive touch sensor drives a SAD/GLAD emotional state machine whose
//! state is rendered on an LED strip, persisted locally and served over a
//! small JSON API with live updates.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use companion::{CompanionRuntime, Hardware};
//! use companion::config::CompanionConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = CompanionConfig::default();
//! let (hardware, panel, _strip) = Hardware::simulated(config.led.led_count);
//! let runtime = CompanionRuntime::start(&config, hardware)?;
//!
//! panel.press(3);
//! tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//! panel.release(3);
//!
//! println!("{}", runtime.machine().current_state());
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`http`** (default): axum query API with SSE and WebSocket live updates
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Platform: companion-hal                                │
//! │  (TouchSensor, LedDriver, Clock, simulated devices)     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  State: companion-state-manager                         │
//! │  (TouchHistory, EmotionalStateMachine, snapshots)       │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Devices: companion-sensorimotor                        │
//! │  (SensorPoller, ColorAnimator)                          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Services: companion-services, companion-io             │
//! │  (event store, StatsCache, NotificationHub)             │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Transport: companion-api                               │
//! │  (axum JSON, SSE, WebSocket)                            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub mod runtime;

pub use companion_config as config;
pub use companion_hal as hal;
pub use companion_io as io;
pub use companion_observability as observability;
pub use companion_sensorimotor as sensorimotor;
pub use companion_services as services;
pub use companion_state_manager as state_manager;

#[cfg(feature = "http")]
pub use companion_api as api;

pub use runtime::{CompanionRuntime, Hardware};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::runtime::{CompanionRuntime, Hardware};
    pub use companion_hal::{Clock, LedDriver, Rgb, TouchSensor};
    pub use companion_io::{NotificationHub, Topic};
    pub use companion_services::{Period, StatisticsService};
    pub use companion_state_manager::{EmotionalState, StateChange, TouchEvent};
}
