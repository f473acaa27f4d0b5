// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion Sensorimotor
//!
//! The device's input and output edges:
//! - [`SensorPoller`] turns raw touch bitmasks into completed [`TouchEvent`]s,
//!   with a data-driven [`RetryPolicy`] for flaky buses
//! - [`SensorWorker`] runs a poller on a dedicated thread (the driver blocks)
//! - [`ColorAnimator`] fades and shimmers the LED strip on tokio tasks with
//!   generation-based cancellation
//!
//! [`TouchEvent`]: companion_state_manager::TouchEvent

pub mod animator;
pub mod effects;
pub mod poller;
pub mod worker;

pub use animator::{AnimationHandle, AnimationOutcome, AnimatorConfig, ColorAnimator};
pub use effects::{StateColorEffect, StatePalette};
pub use poller::{RetryPolicy, SensorPoller, SensorStatus};
pub use worker::SensorWorker;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sensorimotor error types
#[derive(Debug, thiserror::Error)]
pub enum SensorimotorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Hardware error: {0}")]
    Hardware(#[from] companion_hal::HalError),
}

pub type Result<T> = std::result::Result<T, SensorimotorError>;
