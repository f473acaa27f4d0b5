// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed observer list for state transitions.
//!
//! Two kinds of listener hang off the state machine:
//! - [`StateEffect`]: device side effects (LED retarget), run first
//! - [`StateObserver`]: notification consumers (live clients, persistence)
//!
//! Both are invoked synchronously, each in isolation: an error or panic in
//! one is logged and never reaches the caller or the other listeners.

use crate::types::StateChange;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer of state transitions
pub trait StateObserver: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "observer"
    }

    fn on_state_change(&self, change: &StateChange) -> Result<(), ObserverError>;
}

/// Device-side reaction to a transition (must not block)
pub trait StateEffect: Send + Sync {
    fn apply(&self, change: &StateChange);
}

/// Handle returned by observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct FnObserver<F> {
    name: String,
    f: F,
}

impl<F> StateObserver for FnObserver<F>
where
    F: Fn(&StateChange) -> Result<(), ObserverError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_state_change(&self, change: &StateChange) -> Result<(), ObserverError> {
        (self.f)(change)
    }
}

/// Wrap a closure as an observer
pub fn observer_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn StateObserver>
where
    F: Fn(&StateChange) -> Result<(), ObserverError> + Send + Sync + 'static,
{
    Arc::new(FnObserver {
        name: name.into(),
        f,
    })
}

/// Registered effects and observers
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    effects: RwLock<Vec<Arc<dyn StateEffect>>>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn StateObserver>)>>,
}

impl ObserverRegistry {
    pub(crate) fn add_effect(&self, effect: Arc<dyn StateEffect>) {
        self.effects.write().push(effect);
    }

    pub(crate) fn register(&self, observer: Arc<dyn StateObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Run effects, then observers
    ///
    /// Lists are snapshotted first so listeners may (un)register during dispatch.
    /// Returns the number of observers that failed.
    pub(crate) fn dispatch(&self, change: &StateChange) -> usize {
        let effects: Vec<_> = self.effects.read().clone();
        for effect in effects {
            if catch_unwind(AssertUnwindSafe(|| effect.apply(change))).is_err() {
                error!(
                    target: "companion-state-manager",
                    "State effect panicked during {} -> {}",
                    change.old_state,
                    change.new_state
                );
            }
        }

        let observers: Vec<_> = self.observers.read().clone();
        let mut failures = 0;
        for (_, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_state_change(change))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(
                        target: "companion-state-manager",
                        "Observer '{}' failed: {}",
                        observer.name(),
                        e
                    );
                }
                Err(_) => {
                    failures += 1;
                    error!(
                        target: "companion-state-manager",
                        "Observer '{}' panicked",
                        observer.name()
                    );
                }
            }
        }
        failures
    }
}
