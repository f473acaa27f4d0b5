// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion HAL
//!
//! Hardware boundary for the touch companion device.
//!
//! The pipeline never talks to a bus directly. It depends on three traits:
//! - [`TouchSensor`]: 12-channel capacitive touch controller (blocking reads)
//! - [`LedDriver`]: addressable LED strip with a buffered frame and explicit flush
//! - [`Clock`]: wall-clock source, swappable for [`ManualClock`] in tests
//!
//! The `simulated` feature provides in-process implementations so the whole
//! system runs (and is tested) without hardware attached.

pub mod color;
pub mod error;
pub mod hal;
pub mod platforms;

pub use color::Rgb;
pub use error::{HalError, HalResult};
pub use hal::{Clock, LedDriver, ManualClock, SystemClock, TouchSensor};

#[cfg(feature = "simulated")]
pub use platforms::simulated::{
    SimulatedLedStrip, SimulatedStripHandle, SimulatedTouchPanel, SimulatedTouchSensor,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
