// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! SAD/GLAD state machine with two-threshold hysteresis.
//!
//! - SAD -> GLAD when `metric >= upper_threshold`
//! - GLAD -> SAD when `metric < lower_threshold`
//! - anything in between keeps the current state
//!
//! Every transition appends a [`StateChange`], runs registered effects
//! (color retarget), then notifies observers, all after the state lock has
//! been released.

use crate::observers::{ObserverId, ObserverRegistry, StateEffect, StateObserver};
use crate::touch_history::TouchHistory;
use crate::types::{EmotionalState, StateChange, TransitionTrigger};
use crate::{Result, StateError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use companion_hal::Clock;
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Transition records kept in memory (the event store has the full history)
const MAX_IN_MEMORY_TRANSITIONS: usize = 1000;

/// Scalar derived from [`TouchHistory`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateMetric {
    /// Touch count in the trailing `window`
    CountInWindow { window: Duration },
    /// Touches per minute averaged over the trailing `window`
    TouchesPerMinute { window: Duration },
}

impl StateMetric {
    pub fn window(&self) -> Duration {
        match self {
            StateMetric::CountInWindow { window } | StateMetric::TouchesPerMinute { window } => {
                *window
            }
        }
    }

    /// Read the metric from the history
    pub fn measure(&self, history: &TouchHistory) -> f64 {
        match self {
            StateMetric::CountInWindow { window } => history.count_since(*window) as f64,
            StateMetric::TouchesPerMinute { window } => history.touches_per_minute(*window),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateMachineConfig {
    pub metric: StateMetric,
    pub upper_threshold: f64,
    pub lower_threshold: f64,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            metric: StateMetric::CountInWindow {
                window: Duration::from_secs(3600),
            },
            upper_threshold: 20.0,
            lower_threshold: 3.0,
        }
    }
}

impl StateMachineConfig {
    /// Count thresholds may coincide; frequency thresholds must not.
    pub fn validate(&self) -> Result<()> {
        let (upper, lower) = (self.upper_threshold, self.lower_threshold);
        if !upper.is_finite() || !lower.is_finite() || lower < 0.0 {
            return Err(StateError::InvalidConfig(format!(
                "thresholds must be finite and non-negative (lower={}, upper={})",
                lower, upper
            )));
        }
        if self.metric.window().is_zero() {
            return Err(StateError::InvalidConfig(
                "metric window must be greater than zero".to_string(),
            ));
        }
        match self.metric {
            StateMetric::CountInWindow { .. } if lower > upper => Err(StateError::InvalidConfig(
                format!("lower threshold {} exceeds upper threshold {}", lower, upper),
            )),
            StateMetric::TouchesPerMinute { .. } if lower >= upper => {
                Err(StateError::InvalidConfig(format!(
                    "lower threshold {} must be below upper threshold {}",
                    lower, upper
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Point-in-time view of the machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateInfo {
    pub state: EmotionalState,
    /// When the current state was entered (`None` if never transitioned)
    pub since: Option<DateTime<Utc>>,
    /// Last metric value evaluated
    pub last_metric: Option<f64>,
    pub upper_threshold: f64,
    pub lower_threshold: f64,
}

#[derive(Debug)]
struct MachineState {
    current: EmotionalState,
    last_metric: Option<f64>,
    last_change_at: Option<DateTime<Utc>>,
    transitions: VecDeque<StateChange>,
}

/// The emotional state machine
///
/// `current` has exactly one writer at a time: evaluations and overrides are
/// serialized end to end (including effect and observer dispatch), so
/// observers always see transitions in record order. The serialization lock
/// is re-entrant, so an observer may itself call back into the machine.
pub struct EmotionalStateMachine {
    config: StateMachineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<MachineState>,
    transition_lock: ReentrantMutex<()>,
    listeners: ObserverRegistry,
}

impl EmotionalStateMachine {
    /// New machine in the initial SAD state
    pub fn new(config: StateMachineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_initial_state(config, clock, EmotionalState::Sad)
    }

    pub fn with_initial_state(
        config: StateMachineConfig,
        clock: Arc<dyn Clock>,
        initial: EmotionalState,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            state: Mutex::new(MachineState {
                current: initial,
                last_metric: None,
                last_change_at: None,
                transitions: VecDeque::new(),
            }),
            transition_lock: ReentrantMutex::new(()),
            listeners: ObserverRegistry::default(),
        })
    }

    pub fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    pub fn current_state(&self) -> EmotionalState {
        self.state.lock().current
    }

    pub fn info(&self) -> StateInfo {
        let state = self.state.lock();
        StateInfo {
            state: state.current,
            since: state.last_change_at,
            last_metric: state.last_metric,
            upper_threshold: self.config.upper_threshold,
            lower_threshold: self.config.lower_threshold,
        }
    }

    /// Most recent transitions, newest last
    pub fn history(&self, limit: usize) -> Vec<StateChange> {
        let state = self.state.lock();
        let skip = state.transitions.len().saturating_sub(limit);
        state.transitions.iter().skip(skip).cloned().collect()
    }

    /// Effects run before observers on every transition
    pub fn add_effect(&self, effect: Arc<dyn StateEffect>) {
        self.listeners.add_effect(effect);
    }

    pub fn register_observer(&self, observer: Arc<dyn StateObserver>) -> ObserverId {
        self.listeners.register(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.listeners.unregister(id)
    }

    pub fn observer_count(&self) -> usize {
        self.listeners.observer_count()
    }

    /// State the hysteresis rule picks for `metric` from `current`
    fn target_for(&self, current: EmotionalState, metric: f64) -> Option<EmotionalState> {
        match current {
            EmotionalState::Sad if metric >= self.config.upper_threshold => {
                Some(EmotionalState::Glad)
            }
            EmotionalState::Glad if metric < self.config.lower_threshold => {
                Some(EmotionalState::Sad)
            }
            _ => None,
        }
    }

    /// Feed a metric value; returns the transition if one fired
    pub fn evaluate(&self, metric: f64) -> Option<StateChange> {
        let _serial = self.transition_lock.lock();
        let change = {
            let mut state = self.state.lock();
            state.last_metric = Some(metric);
            let next = self.target_for(state.current, metric)?;
            self.record_transition(&mut state, next, TransitionTrigger::Threshold { metric })
        };

        info!(
            target: "companion-state-manager",
            "Emotional state {} -> {} (metric={:.2}, lower={}, upper={})",
            change.old_state,
            change.new_state,
            metric,
            self.config.lower_threshold,
            self.config.upper_threshold
        );
        self.listeners.dispatch(&change);
        Some(change)
    }

    /// Measure `history` with the configured metric and evaluate
    pub fn evaluate_history(&self, history: &TouchHistory) -> Option<StateChange> {
        let metric = self.config.metric.measure(history);
        debug!(target: "companion-state-manager", "Evaluating state with metric {:.2}", metric);
        self.evaluate(metric)
    }

    /// Manual override: records and dispatches like a threshold transition
    ///
    /// Forcing the current state is a no-op and returns `None`.
    pub fn force_state(&self, target: EmotionalState) -> Option<StateChange> {
        let _serial = self.transition_lock.lock();
        let change = {
            let mut state = self.state.lock();
            if state.current == target {
                return None;
            }
            self.record_transition(&mut state, target, TransitionTrigger::Manual)
        };

        info!(
            target: "companion-state-manager",
            "Emotional state forced {} -> {}",
            change.old_state,
            change.new_state
        );
        self.listeners.dispatch(&change);
        Some(change)
    }

    /// Adopt a persisted state without recording or dispatching
    ///
    /// `since` is when that state was entered; later transitions are stamped
    /// strictly after it.
    pub fn restore_state(&self, restored: EmotionalState, since: Option<DateTime<Utc>>) {
        let _serial = self.transition_lock.lock();
        let mut state = self.state.lock();
        state.current = restored;
        state.last_change_at = since;
    }

    fn record_transition(
        &self,
        state: &mut MachineState,
        next: EmotionalState,
        trigger: TransitionTrigger,
    ) -> StateChange {
        let mut timestamp = self.clock.now();
        if let Some(last) = state.last_change_at {
            if timestamp <= last {
                timestamp = last + ChronoDuration::microseconds(1);
            }
        }

        let change = StateChange {
            old_state: state.current,
            new_state: next,
            timestamp,
            trigger,
        };

        state.current = next;
        state.last_change_at = Some(timestamp);
        if state.transitions.len() == MAX_IN_MEMORY_TRANSITIONS {
            state.transitions.pop_front();
        }
        state.transitions.push_back(change.clone());
        change
    }
}

impl std::fmt::Debug for EmotionalStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionalStateMachine")
            .field("config", &self.config)
            .field("state", &self.current_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::observer_fn;
    use crate::touch_history::TouchHistoryConfig;
    use crate::types::TouchEvent;
    use chrono::TimeZone;
    use companion_hal::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn machine(clock: Arc<ManualClock>) -> EmotionalStateMachine {
        EmotionalStateMachine::new(StateMachineConfig::default(), clock).unwrap()
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = StateMachineConfig {
            upper_threshold: 3.0,
            lower_threshold: 20.0,
            ..Default::default()
        };
        assert!(EmotionalStateMachine::new(config, clock()).is_err());

        let frequency = StateMachineConfig {
            metric: StateMetric::TouchesPerMinute {
                window: Duration::from_secs(600),
            },
            upper_threshold: 2.0,
            lower_threshold: 2.0,
        };
        assert!(frequency.validate().is_err());
        assert!(StateMachineConfig { lower_threshold: 20.0, ..Default::default() }
            .validate()
            .is_ok());
    }

    #[test]
    fn hysteresis_band_holds_state() {
        let machine = machine(clock());
        assert!(machine.evaluate(10.0).is_none());
        assert!(machine.evaluate(19.99).is_none());
        assert_eq!(machine.current_state(), EmotionalState::Sad);

        let up = machine.evaluate(20.0).unwrap();
        assert_eq!(up.new_state, EmotionalState::Glad);
        // between thresholds while glad: stays glad
        assert!(machine.evaluate(3.0).is_none());
        assert!(machine.evaluate(10.0).is_none());

        let down = machine.evaluate(2.0).unwrap();
        assert_eq!(down.new_state, EmotionalState::Sad);
        assert_eq!(machine.history(10).len(), 2);
    }

    #[test]
    fn force_state_records_and_skips_duplicates() {
        let machine = machine(clock());
        assert!(machine.force_state(EmotionalState::Sad).is_none());
        let change = machine.force_state(EmotionalState::Glad).unwrap();
        assert_eq!(change.trigger, TransitionTrigger::Manual);
        assert!(machine.force_state(EmotionalState::Glad).is_none());
        assert_eq!(machine.history(10), vec![change]);
    }

    #[test]
    fn transition_timestamps_strictly_increase() {
        let clock = clock();
        let machine = machine(clock);
        machine.force_state(EmotionalState::Glad);
        machine.force_state(EmotionalState::Sad);
        machine.force_state(EmotionalState::Glad);
        let history = machine.history(10);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(history.windows(2).all(|w| w[0].new_state != w[1].new_state));
    }

    #[test]
    fn failing_and_panicking_observers_are_isolated() {
        let machine = machine(clock());
        let seen = Arc::new(AtomicUsize::new(0));

        machine.register_observer(observer_fn("fails", |_| Err("boom".into())));
        machine.register_observer(observer_fn("panics", |_| panic!("observer bug")));
        let counter = seen.clone();
        machine.register_observer(observer_fn("counts", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        assert!(machine.force_state(EmotionalState::Glad).is_some());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(machine.current_state(), EmotionalState::Glad);
    }

    #[test]
    fn unregistered_observer_is_not_called() {
        let machine = machine(clock());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = machine.register_observer(observer_fn("counts", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert!(machine.unregister_observer(id));
        assert!(!machine.unregister_observer(id));
        machine.force_state(EmotionalState::Glad);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn evaluate_history_uses_configured_window() {
        let clock = clock();
        let history = TouchHistory::new(TouchHistoryConfig::default(), clock.clone()).unwrap();
        let machine = machine(clock.clone());
        for _ in 0..25 {
            history.record(&TouchEvent::new(1, clock.now(), 0.1).unwrap());
            machine.evaluate_history(&history);
        }
        assert_eq!(machine.current_state(), EmotionalState::Glad);
        assert_eq!(machine.history(10).len(), 1);
    }

    #[test]
    fn restored_state_keeps_entry_time() {
        let clock = clock();
        let machine = machine(clock.clone());
        // entered after the current wall time, as after a clock step back
        let entered = clock.now() + ChronoDuration::seconds(5);
        machine.restore_state(EmotionalState::Glad, Some(entered));

        let info = machine.info();
        assert_eq!(info.state, EmotionalState::Glad);
        assert_eq!(info.since, Some(entered));
        assert!(machine.history(10).is_empty());

        let change = machine.force_state(EmotionalState::Sad).unwrap();
        assert_eq!(change.old_state, EmotionalState::Glad);
        assert!(change.timestamp > entered);
    }
}
