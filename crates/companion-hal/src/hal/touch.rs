// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::HalResult;

/// Capacitive touch controller (MPR121-style, up to 16 electrodes)
///
/// Electrode-level threshold/release hysteresis is the controller's job;
/// callers only see the debounced per-channel bitmask.
pub trait TouchSensor: Send {
    /// Bring the controller into a known state
    ///
    /// # Returns
    /// `Ok(true)` if the device answered and is configured, `Ok(false)` if it
    /// answered but rejected configuration, or a bus error
    fn initialize(&mut self) -> HalResult<bool>;

    /// Read the touched-channel bitmask (bit N set = channel N touched)
    ///
    /// Blocking bus transfer.
    fn read_touch_bitmask(&mut self) -> HalResult<u16>;

    /// Human readable device name for logs
    fn name(&self) -> &'static str {
        "touch-sensor"
    }
}

impl<T: TouchSensor + ?Sized> TouchSensor for Box<T> {
    fn initialize(&mut self) -> HalResult<bool> {
        (**self).initialize()
    }

    fn read_touch_bitmask(&mut self) -> HalResult<u16> {
        (**self).read_touch_bitmask()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
