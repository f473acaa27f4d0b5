// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulated touch panel and LED strip.
//!
//! Both devices are split into a driver half (handed to the pipeline, which
//! takes ownership) and a cloneable handle that tests and the dev tooling keep
//! to press channels, inject faults, and inspect what was rendered.

use crate::color::Rgb;
use crate::error::{HalError, HalResult};
use crate::hal::{LedDriver, TouchSensor};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

const MAX_RECORDED_FRAMES: usize = 4096;

#[derive(Debug, Default)]
struct PanelState {
    mask: u16,
    script: VecDeque<u16>,
    failing_reads: u32,
    failing_inits: u32,
    initialized: bool,
    init_calls: u32,
    reads: u64,
}

/// Control handle for a [`SimulatedTouchSensor`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedTouchPanel {
    state: Arc<Mutex<PanelState>>,
}

impl SimulatedTouchPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the driver half bound to this panel
    pub fn sensor(&self) -> SimulatedTouchSensor {
        SimulatedTouchSensor {
            state: Arc::clone(&self.state),
        }
    }

    /// Hold a channel down until [`release`](Self::release)
    pub fn press(&self, channel: u8) {
        if channel < 16 {
            self.state.lock().mask |= 1 << channel;
        }
    }

    pub fn release(&self, channel: u8) {
        if channel < 16 {
            self.state.lock().mask &= !(1 << channel);
        }
    }

    pub fn release_all(&self) {
        self.state.lock().mask = 0;
    }

    /// Queue one-shot readings returned before falling back to the held mask
    pub fn push_readings<I: IntoIterator<Item = u16>>(&self, masks: I) {
        self.state.lock().script.extend(masks);
    }

    /// Make the next `count` reads fail with a bus error
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Make the next `count` initialization attempts fail
    pub fn fail_initializations(&self, count: u32) {
        self.state.lock().failing_inits = count;
    }

    /// Number of times `initialize()` has been called
    pub fn init_calls(&self) -> u32 {
        self.state.lock().init_calls
    }

    pub fn reads(&self) -> u64 {
        self.state.lock().reads
    }
}

/// Driver half of the simulated touch panel
#[derive(Debug)]
pub struct SimulatedTouchSensor {
    state: Arc<Mutex<PanelState>>,
}

impl SimulatedTouchSensor {
    /// Standalone sensor plus its control handle
    pub fn new() -> (Self, SimulatedTouchPanel) {
        let panel = SimulatedTouchPanel::new();
        (panel.sensor(), panel)
    }
}

impl TouchSensor for SimulatedTouchSensor {
    fn initialize(&mut self) -> HalResult<bool> {
        let mut state = self.state.lock();
        state.init_calls += 1;
        if state.failing_inits > 0 {
            state.failing_inits -= 1;
            state.initialized = false;
            return Err(HalError::Io("simulated initialization failure".to_string()));
        }
        state.initialized = true;
        debug!(target: "companion-hal", "Simulated touch panel initialized");
        Ok(true)
    }

    fn read_touch_bitmask(&mut self) -> HalResult<u16> {
        let mut state = self.state.lock();
        state.reads += 1;
        if !state.initialized {
            return Err(HalError::NotInitialized("simulated touch panel".to_string()));
        }
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(HalError::Io("simulated read failure".to_string()));
        }
        Ok(state.script.pop_front().unwrap_or(state.mask))
    }

    fn name(&self) -> &'static str {
        "simulated-touch-panel"
    }
}

#[derive(Debug)]
struct StripState {
    buffer: Vec<Rgb>,
    displayed: Vec<Rgb>,
    frames: VecDeque<Vec<Rgb>>,
    failing_flushes: u32,
    flushes: u64,
}

/// Inspection handle for a [`SimulatedLedStrip`]
#[derive(Debug, Clone)]
pub struct SimulatedStripHandle {
    state: Arc<Mutex<StripState>>,
}

impl SimulatedStripHandle {
    /// Pixels currently shown (last successful flush)
    pub fn displayed(&self) -> Vec<Rgb> {
        self.state.lock().displayed.clone()
    }

    /// Every successfully flushed frame, oldest first (bounded)
    pub fn frames(&self) -> Vec<Vec<Rgb>> {
        self.state.lock().frames.iter().cloned().collect()
    }

    /// Color of each flushed frame, assuming a solid fill
    pub fn frame_colors(&self) -> Vec<Rgb> {
        self.state
            .lock()
            .frames
            .iter()
            .filter_map(|frame| frame.first().copied())
            .collect()
    }

    pub fn clear_frames(&self) {
        self.state.lock().frames.clear();
    }

    /// Make the next `count` flushes fail
    pub fn fail_flushes(&self, count: u32) {
        self.state.lock().failing_flushes = count;
    }

    pub fn flush_count(&self) -> u64 {
        self.state.lock().flushes
    }
}

/// In-memory LED strip that records flushed frames
#[derive(Debug)]
pub struct SimulatedLedStrip {
    state: Arc<Mutex<StripState>>,
}

impl SimulatedLedStrip {
    pub fn new(pixel_count: usize) -> (Self, SimulatedStripHandle) {
        let state = Arc::new(Mutex::new(StripState {
            buffer: vec![Rgb::BLACK; pixel_count],
            displayed: vec![Rgb::BLACK; pixel_count],
            frames: VecDeque::new(),
            failing_flushes: 0,
            flushes: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedStripHandle { state },
        )
    }
}

impl LedDriver for SimulatedLedStrip {
    fn pixel_count(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HalResult<()> {
        let mut state = self.state.lock();
        let count = state.buffer.len();
        match state.buffer.get_mut(index) {
            Some(pixel) => {
                *pixel = Rgb::new(r, g, b);
                Ok(())
            }
            None => Err(HalError::PixelOutOfRange { index, count }),
        }
    }

    fn flush(&mut self) -> HalResult<()> {
        let mut state = self.state.lock();
        if state.failing_flushes > 0 {
            state.failing_flushes -= 1;
            return Err(HalError::Io("simulated flush failure".to_string()));
        }
        let frame = state.buffer.clone();
        state.displayed = frame.clone();
        if state.frames.len() == MAX_RECORDED_FRAMES {
            state.frames.pop_front();
        }
        state.frames.push_back(frame);
        state.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fail_until_initialized() {
        let (mut sensor, panel) = SimulatedTouchSensor::new();
        assert!(matches!(
            sensor.read_touch_bitmask(),
            Err(HalError::NotInitialized(_))
        ));
        assert!(sensor.initialize().unwrap());
        panel.press(3);
        assert_eq!(sensor.read_touch_bitmask().unwrap(), 0b1000);
        panel.release(3);
        assert_eq!(sensor.read_touch_bitmask().unwrap(), 0);
    }

    #[test]
    fn scripted_readings_come_first() {
        let (mut sensor, panel) = SimulatedTouchSensor::new();
        sensor.initialize().unwrap();
        panel.press(0);
        panel.push_readings([0b10, 0]);
        assert_eq!(sensor.read_touch_bitmask().unwrap(), 0b10);
        assert_eq!(sensor.read_touch_bitmask().unwrap(), 0);
        assert_eq!(sensor.read_touch_bitmask().unwrap(), 0b1);
    }

    #[test]
    fn injected_failures_are_consumed() {
        let (mut sensor, panel) = SimulatedTouchSensor::new();
        panel.fail_initializations(1);
        assert!(sensor.initialize().is_err());
        assert!(sensor.initialize().unwrap());
        panel.fail_reads(2);
        assert!(sensor.read_touch_bitmask().is_err());
        assert!(sensor.read_touch_bitmask().is_err());
        assert!(sensor.read_touch_bitmask().is_ok());
        assert_eq!(panel.init_calls(), 2);
    }

    #[test]
    fn strip_shows_only_flushed_frames() {
        let (mut strip, handle) = SimulatedLedStrip::new(2);
        strip.set_pixel(0, 1, 2, 3).unwrap();
        assert_eq!(handle.displayed(), vec![Rgb::BLACK, Rgb::BLACK]);
        strip.flush().unwrap();
        assert_eq!(handle.displayed()[0], Rgb::new(1, 2, 3));
        assert_eq!(handle.frames().len(), 1);
        assert_eq!(
            strip.set_pixel(5, 0, 0, 0),
            Err(HalError::PixelOutOfRange { index: 5, count: 2 })
        );
    }

    #[test]
    fn failed_flush_keeps_previous_frame() {
        let (mut strip, handle) = SimulatedLedStrip::new(1);
        strip.set_pixel(0, 9, 9, 9).unwrap();
        strip.flush().unwrap();
        handle.fail_flushes(1);
        strip.set_pixel(0, 1, 1, 1).unwrap();
        assert!(strip.flush().is_err());
        assert_eq!(handle.displayed(), vec![Rgb::new(9, 9, 9)]);
    }
}
