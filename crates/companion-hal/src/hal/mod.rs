// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Hardware Abstraction Layer (HAL) trait definitions for the companion device
///
/// Every platform provides:
/// - Touch sensing (TouchSensor)
/// - LED output (LedDriver)
/// - Wall-clock time (Clock)

/// Addressable LED strip traits.
pub mod led;
/// Wall-clock abstraction and a manually driven clock for tests.
pub mod time;
/// Capacitive touch controller traits.
pub mod touch;

pub use led::LedDriver;
pub use time::{Clock, ManualClock, SystemClock};
pub use touch::TouchSensor;
