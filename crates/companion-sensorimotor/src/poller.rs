// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Edge-detecting touch poller.
//!
//! Each channel keeps a "touched since" timestamp. A 0 -> 1 edge records the
//! start; a 1 -> 0 edge emits one [`TouchEvent`]. The controller already
//! debounces at the electrode level, so nothing else is filtered here.
//!
//! Read failures count as "no change". Enough consecutive failures trigger a
//! re-initialization; a failed re-initialization parks the poller for a
//! cooldown. The poller never gives up.

use crate::{Result, SensorimotorError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use companion_hal::{Clock, HalError, TouchSensor};
use companion_state_manager::{TouchEvent, MAX_CHANNELS};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Failure handling for the sensor bus, as data
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Normal sampling cadence
    pub poll_interval: Duration,
    /// Consecutive failed reads that trigger re-initialization
    pub max_consecutive_failures: u32,
    /// A failure more than this long after the previous one restarts the count
    pub failure_window: Duration,
    /// Pause after a failed (re-)initialization
    pub cooldown: Duration,
    /// Pause after a single failed read
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            max_consecutive_failures: 5,
            failure_window: Duration::from_secs(10),
            cooldown: Duration::from_secs(10),
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SensorimotorError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(SensorimotorError::InvalidConfig(
                "max consecutive failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Poller health, exposed by `/health`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorStatus {
    pub initialized: bool,
    pub active_touches: Vec<u8>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub reinitializations: u64,
    pub in_cooldown: bool,
    pub last_error: Option<String>,
    pub polls: u64,
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

/// Touch poller over a blocking [`TouchSensor`]
pub struct SensorPoller {
    sensor: Box<dyn TouchSensor>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    channel_count: u8,
    touch_started: Vec<Option<DateTime<Utc>>>,
    initialized: bool,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    cooldown_until: Option<DateTime<Utc>>,
    last_poll_failed: bool,
    total_failures: u64,
    reinitializations: u64,
    last_error: Option<String>,
    polls: u64,
}

impl SensorPoller {
    /// # Errors
    /// `channel_count` must be in `1..=12` and the policy must validate
    pub fn new(
        sensor: Box<dyn TouchSensor>,
        channel_count: u8,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if channel_count == 0 || channel_count > MAX_CHANNELS {
            return Err(SensorimotorError::InvalidConfig(format!(
                "channel count {} is outside 1..={}",
                channel_count, MAX_CHANNELS
            )));
        }
        policy.validate()?;

        Ok(Self {
            sensor,
            clock,
            policy,
            channel_count,
            touch_started: vec![None; usize::from(channel_count)],
            initialized: false,
            consecutive_failures: 0,
            last_failure_at: None,
            cooldown_until: None,
            last_poll_failed: false,
            total_failures: 0,
            reinitializations: 0,
            last_error: None,
            polls: 0,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Initialize the sensor; on failure the poller enters cooldown
    pub fn initialize(&mut self) -> bool {
        let now = self.clock.now();
        let ok = match self.sensor.initialize() {
            Ok(true) => true,
            Ok(false) => {
                self.last_error = Some("sensor rejected configuration".to_string());
                false
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                false
            }
        };

        self.initialized = ok;
        if ok {
            self.consecutive_failures = 0;
            self.cooldown_until = None;
            info!(target: "companion-sensorimotor", "Touch sensor '{}' initialized", self.sensor.name());
        } else {
            self.cooldown_until = Some(now + to_chrono(self.policy.cooldown));
            error!(
                target: "companion-sensorimotor",
                "Touch sensor '{}' failed to initialize ({}); retrying in {:?}",
                self.sensor.name(),
                self.last_error.as_deref().unwrap_or("unknown error"),
                self.policy.cooldown
            );
        }
        ok
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Sample the sensor once and return touches that just ended
    pub fn poll(&mut self) -> Vec<TouchEvent> {
        let now = self.clock.now();
        self.polls += 1;

        if self.in_cooldown(now) {
            return Vec::new();
        }
        if !self.initialized && !self.initialize() {
            return Vec::new();
        }

        match self.sensor.read_touch_bitmask() {
            Ok(mask) => {
                self.last_poll_failed = false;
                self.consecutive_failures = 0;
                self.detect_edges(mask, now)
            }
            Err(e) => {
                self.record_failure(e, now);
                Vec::new()
            }
        }
    }

    fn detect_edges(&mut self, mask: u16, now: DateTime<Utc>) -> Vec<TouchEvent> {
        let mut events = Vec::new();
        for channel in 0..self.channel_count {
            let touched = mask & (1 << channel) != 0;
            let slot = &mut self.touch_started[usize::from(channel)];
            match (touched, *slot) {
                (true, None) => {
                    *slot = Some(now);
                    trace!(target: "companion-sensorimotor", "Channel {} touched", channel);
                }
                (false, Some(started)) => {
                    *slot = None;
                    if let Some(event) = Self::close_touch(channel, started, now) {
                        debug!(
                            target: "companion-sensorimotor",
                            "Channel {} released after {:.3}s",
                            channel,
                            event.duration_secs()
                        );
                        events.push(event);
                    }
                }
                _ => {}
            }
        }
        events
    }

    fn close_touch(channel: u8, started: DateTime<Utc>, now: DateTime<Utc>) -> Option<TouchEvent> {
        // a clock step backwards yields a zero-length touch, not a negative one
        let end = now.max(started);
        match TouchEvent::from_edges(channel, started, end) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(target: "companion-sensorimotor", "Dropping touch on channel {}: {}", channel, e);
                None
            }
        }
    }

    fn record_failure(&mut self, err: HalError, now: DateTime<Utc>) {
        if let Some(previous) = self.last_failure_at {
            if now - previous > to_chrono(self.policy.failure_window) {
                self.consecutive_failures = 0;
            }
        }
        self.last_failure_at = Some(now);
        self.last_poll_failed = true;
        self.consecutive_failures += 1;
        self.total_failures += 1;
        self.last_error = Some(err.to_string());

        warn!(
            target: "companion-sensorimotor",
            "Touch read failed ({}/{}): {}",
            self.consecutive_failures,
            self.policy.max_consecutive_failures,
            err
        );

        if self.consecutive_failures >= self.policy.max_consecutive_failures {
            warn!(target: "companion-sensorimotor", "Too many consecutive read failures, re-initializing sensor");
            self.reinitializations += 1;
            self.initialize();
        }
    }

    /// How long the caller should wait before the next `poll`
    pub fn next_delay(&self) -> Duration {
        let now = self.clock.now();
        if let Some(until) = self.cooldown_until.filter(|until| now < *until) {
            return (until - now).to_std().unwrap_or(self.policy.cooldown);
        }
        if self.last_poll_failed {
            self.policy.retry_delay
        } else {
            self.policy.poll_interval
        }
    }

    /// Close every touch still in progress (used on shutdown)
    pub fn drain_active(&mut self) -> Vec<TouchEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        for channel in 0..self.channel_count {
            if let Some(started) = self.touch_started[usize::from(channel)].take() {
                events.extend(Self::close_touch(channel, started, now));
            }
        }
        events
    }

    pub fn status(&self) -> SensorStatus {
        SensorStatus {
            initialized: self.initialized,
            active_touches: (0..self.channel_count)
                .filter(|c| self.touch_started[usize::from(*c)].is_some())
                .collect(),
            consecutive_failures: self.consecutive_failures,
            total_failures: self.total_failures,
            reinitializations: self.reinitializations,
            in_cooldown: self.in_cooldown(self.clock.now()),
            last_error: self.last_error.clone(),
            polls: self.polls,
        }
    }
}
