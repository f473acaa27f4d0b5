// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retarget races and the state-driven color effect.

use chrono::Utc;
use companion_hal::{ManualClock, Rgb, SimulatedLedStrip, SimulatedStripHandle};
use companion_sensorimotor::{
    AnimationOutcome, AnimatorConfig, ColorAnimator, StateColorEffect, StatePalette,
};
use companion_state_manager::{EmotionalState, EmotionalStateMachine, StateMachineConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn strip_animator(step_delay: Duration) -> (Arc<ColorAnimator>, SimulatedStripHandle) {
    let (strip, handle) = SimulatedLedStrip::new(8);
    let animator = ColorAnimator::new(
        Box::new(strip),
        AnimatorConfig {
            brightness: 255,
            step_delay,
            shimmer_interval: Duration::from_millis(5),
        },
    )
    .unwrap();
    (Arc::new(animator), handle)
}

fn trajectory(from: Rgb, to: Rgb, steps: u32) -> HashSet<Rgb> {
    (0..=steps).map(|step| from.lerp(to, step, steps)).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_retarget_wins_without_stale_frames() {
    let (animator, strip) = strip_animator(Duration::from_millis(2));
    let color_a = Rgb::new(255, 0, 0);
    let color_b = Rgb::new(0, 255, 0);

    let first = animator.retarget(color_a, 10);
    tokio::time::sleep(Duration::from_millis(7)).await;
    let second = animator.retarget(color_b, 10);
    let frames_before_second = strip.frames().len();
    let expected = trajectory(second.from(), color_b, 10);

    assert_eq!(first.wait().await, AnimationOutcome::Superseded);
    assert_eq!(second.wait().await, AnimationOutcome::Completed);

    // the second run writes exactly steps + 1 frames and nothing else follows the call
    let all = strip.frame_colors();
    assert!(all.len() - frames_before_second <= 11);
    let tail = &all[all.len() - 11..];
    assert!(
        tail.iter().all(|c| expected.contains(c)),
        "frame off the second trajectory: {:?}",
        tail
    );
    assert_eq!(strip.displayed(), vec![color_b; 8]);
    assert_eq!(animator.current_color(), color_b);
}

#[tokio::test]
async fn immediate_double_retarget_ends_at_second_color() {
    let (animator, strip) = strip_animator(Duration::from_millis(1));
    let target = Rgb::new(200, 0, 100);
    let first = animator.retarget(Rgb::new(10, 20, 30), 10);
    let second = animator.retarget(target, 10);

    assert_eq!(first.wait().await, AnimationOutcome::Superseded);
    assert_eq!(second.wait().await, AnimationOutcome::Completed);

    let expected = trajectory(Rgb::BLACK, target, 10);
    assert!(strip.frame_colors().iter().all(|c| expected.contains(c)));
    assert_eq!(animator.current_color(), target);
}

#[tokio::test]
async fn state_transition_fades_to_state_color() {
    let (animator, strip) = strip_animator(Duration::ZERO);
    let palette = StatePalette::default();
    let machine = EmotionalStateMachine::new(
        StateMachineConfig::default(),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .unwrap();
    machine.add_effect(Arc::new(StateColorEffect::new(animator.clone(), palette, 5)));

    machine.force_state(EmotionalState::Glad);
    assert!(animator.in_transition());
    for _ in 0..500 {
        if !animator.in_transition() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(animator.current_color(), palette.glad);
    assert_eq!(strip.displayed(), vec![palette.glad; 8]);
}
