// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Emotional state -> LED color.

use crate::animator::ColorAnimator;
use companion_hal::Rgb;
use companion_state_manager::{EmotionalState, StateChange, StateEffect};
use serde::Serialize;
use std::sync::Arc;

/// Color shown for each state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatePalette {
    pub sad: Rgb,
    pub glad: Rgb,
}

impl Default for StatePalette {
    fn default() -> Self {
        Self {
            sad: Rgb::new(0, 0, 255),
            glad: Rgb::new(255, 255, 0),
        }
    }
}

impl StatePalette {
    pub fn color_for(&self, state: EmotionalState) -> Rgb {
        match state {
            EmotionalState::Sad => self.sad,
            EmotionalState::Glad => self.glad,
        }
    }
}

/// Fades the strip to the new state's color on every transition
pub struct StateColorEffect {
    animator: Arc<ColorAnimator>,
    palette: StatePalette,
    steps: u32,
}

impl StateColorEffect {
    pub fn new(animator: Arc<ColorAnimator>, palette: StatePalette, steps: u32) -> Self {
        Self {
            animator,
            palette,
            steps,
        }
    }
}

impl StateEffect for StateColorEffect {
    fn apply(&self, change: &StateChange) {
        // the animation runs detached; a newer transition supersedes it
        let _ = self
            .animator
            .retarget(self.palette.color_for(change.new_state), self.steps);
    }
}
