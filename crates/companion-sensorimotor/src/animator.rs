// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cancellable LED color animation.
//!
//! Every animation run owns a generation number. Starting a new run (fade,
//! shimmer, or stop) bumps the generation; a frame is only written if its
//! generation is still current, and that check happens under the same lock
//! `retarget` takes to bump it. Once `retarget` returns, no frame from an
//! older run can reach the strip.
//!
//! LED writes block, so each frame goes through `spawn_blocking`; the
//! animation itself is a tokio task sleeping between frames.

use crate::{Result, SensorimotorError};
use companion_hal::{LedDriver, Rgb};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Animation timing and output scaling
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatorConfig {
    /// Global brightness applied to every written pixel (255 = unscaled)
    pub brightness: u8,
    /// Pause between fade frames
    pub step_delay: Duration,
    /// Pause between shimmer frames
    pub shimmer_interval: Duration,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            brightness: 255,
            step_delay: Duration::from_millis(100),
            shimmer_interval: Duration::from_millis(100),
        }
    }
}

/// An in-flight fade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationTarget {
    pub from_color: Rgb,
    pub to_color: Rgb,
    pub steps: u32,
    pub elapsed_step: u32,
}

/// How an animation run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Final frame written
    Completed,
    /// A newer run took over before this one finished
    Superseded,
    /// Hardware write failed; the strip shows the last successful frame
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Idle,
    Fading(AnimationTarget),
    Shimmering { base: Rgb },
}

struct AnimState {
    current: Rgb,
    generation: u64,
    mode: Mode,
}

enum Frame {
    Solid(Rgb),
    Pixels(Vec<Rgb>),
}

struct Shared {
    state: Mutex<AnimState>,
    driver: Mutex<Box<dyn LedDriver>>,
    pixel_count: usize,
    brightness: u8,
}

impl Shared {
    /// Write one frame if `generation` is still current (blocking)
    ///
    /// Lock order: state, then driver.
    fn write_frame(&self, generation: u64, frame: &Frame) -> Option<AnimationOutcome> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Some(AnimationOutcome::Superseded);
        }

        let mut driver = self.driver.lock();
        let written = match frame {
            Frame::Solid(color) => {
                let scaled = color.with_brightness(self.brightness);
                (0..self.pixel_count)
                    .try_for_each(|i| driver.set_pixel(i, scaled.r, scaled.g, scaled.b))
            }
            Frame::Pixels(pixels) => pixels.iter().enumerate().try_for_each(|(i, color)| {
                let scaled = color.with_brightness(self.brightness);
                driver.set_pixel(i, scaled.r, scaled.g, scaled.b)
            }),
        }
        .and_then(|()| driver.flush());

        match written {
            Ok(()) => {
                if let Frame::Solid(color) = frame {
                    state.current = *color;
                }
                None
            }
            Err(e) => {
                state.mode = Mode::Idle;
                Some(AnimationOutcome::Failed(e.to_string()))
            }
        }
    }

    fn mark_step(&self, generation: u64, elapsed_step: u32) {
        let mut state = self.state.lock();
        if state.generation == generation {
            if let Mode::Fading(target) = &mut state.mode {
                target.elapsed_step = elapsed_step;
            }
        }
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.mode = Mode::Idle;
        }
    }
}

async fn write(shared: &Arc<Shared>, generation: u64, frame: Frame) -> Option<AnimationOutcome> {
    let shared = Arc::clone(shared);
    match tokio::task::spawn_blocking(move || shared.write_frame(generation, &frame)).await {
        Ok(result) => result,
        Err(e) => Some(AnimationOutcome::Failed(format!("LED write task failed: {}", e))),
    }
}

fn log_abort(outcome: &AnimationOutcome, what: &str) {
    match outcome {
        AnimationOutcome::Failed(reason) => {
            error!(target: "companion-sensorimotor", "{} aborted, LED write failed: {}", what, reason)
        }
        AnimationOutcome::Superseded => {
            debug!(target: "companion-sensorimotor", "{} superseded", what)
        }
        AnimationOutcome::Completed => {}
    }
}

async fn run_fade(
    shared: Arc<Shared>,
    generation: u64,
    from: Rgb,
    to: Rgb,
    steps: u32,
    step_delay: Duration,
) -> AnimationOutcome {
    for step in 0..steps {
        if let Some(outcome) = write(&shared, generation, Frame::Solid(from.lerp(to, step, steps))).await {
            log_abort(&outcome, "Color transition");
            return outcome;
        }
        shared.mark_step(generation, step + 1);
        tokio::time::sleep(step_delay).await;
    }

    // Snap exactly to the target
    if let Some(outcome) = write(&shared, generation, Frame::Solid(to)).await {
        log_abort(&outcome, "Color transition");
        return outcome;
    }
    shared.finish(generation);
    debug!(target: "companion-sensorimotor", "Color transition to {} complete", to);
    AnimationOutcome::Completed
}

async fn run_shimmer(
    shared: Arc<Shared>,
    generation: u64,
    base: Rgb,
    interval: Duration,
) -> AnimationOutcome {
    let mut rng = StdRng::from_entropy();
    let mut phases: Vec<f64> = (0..shared.pixel_count)
        .map(|_| rng.gen_range(0.0..TAU))
        .collect();
    let speeds: Vec<f64> = (0..shared.pixel_count)
        .map(|_| rng.gen_range(0.3..1.0))
        .collect();

    loop {
        let pixels = phases
            .iter()
            .map(|phase| base.scale(0.7 + phase.sin() * 0.5))
            .collect();
        if let Some(outcome) = write(&shared, generation, Frame::Pixels(pixels)).await {
            log_abort(&outcome, "Shimmer");
            return outcome;
        }
        for (phase, speed) in phases.iter_mut().zip(&speeds) {
            *phase += 0.3 * speed;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Handle to one animation run
pub struct AnimationHandle {
    from: Rgb,
    to: Rgb,
    generation: u64,
    task: JoinHandle<AnimationOutcome>,
}

impl AnimationHandle {
    /// Color the run started from
    pub fn from(&self) -> Rgb {
        self.from
    }

    /// Color the run is heading to (the base color for shimmer)
    pub fn to(&self) -> Rgb {
        self.to
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the run to end
    pub async fn wait(self) -> AnimationOutcome {
        self.task
            .await
            .unwrap_or_else(|e| AnimationOutcome::Failed(format!("animation task ended: {}", e)))
    }
}

/// Owner of the LED strip's displayed color
///
/// Nothing else writes to the strip.
pub struct ColorAnimator {
    shared: Arc<Shared>,
    config: AnimatorConfig,
    runtime: Handle,
}

impl ColorAnimator {
    /// Create an animator on the current tokio runtime
    ///
    /// # Errors
    /// `NoRuntime` outside a tokio runtime; `InvalidConfig` for an empty strip
    pub fn new(driver: Box<dyn LedDriver>, config: AnimatorConfig) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| SensorimotorError::NoRuntime(e.to_string()))?;
        Self::with_runtime(driver, config, runtime)
    }

    pub fn with_runtime(
        driver: Box<dyn LedDriver>,
        config: AnimatorConfig,
        runtime: Handle,
    ) -> Result<Self> {
        let pixel_count = driver.pixel_count();
        if pixel_count == 0 {
            return Err(SensorimotorError::InvalidConfig(
                "LED strip has no pixels".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(AnimState {
                    current: Rgb::BLACK,
                    generation: 0,
                    mode: Mode::Idle,
                }),
                driver: Mutex::new(driver),
                pixel_count,
                brightness: config.brightness,
            }),
            config,
            runtime,
        })
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    pub fn pixel_count(&self) -> usize {
        self.shared.pixel_count
    }

    /// Last solid color successfully written (unscaled)
    pub fn current_color(&self) -> Rgb {
        self.shared.state.lock().current
    }

    pub fn in_transition(&self) -> bool {
        matches!(self.shared.state.lock().mode, Mode::Fading(_))
    }

    pub fn is_shimmering(&self) -> bool {
        matches!(self.shared.state.lock().mode, Mode::Shimmering { .. })
    }

    /// The fade in flight, if any
    pub fn target(&self) -> Option<AnimationTarget> {
        match self.shared.state.lock().mode {
            Mode::Fading(target) => Some(target),
            _ => None,
        }
    }

    /// Cancel whatever is running and fade from the displayed color to `color`
    ///
    /// `steps == 0` writes `color` immediately. May block for the duration of
    /// one in-progress frame write.
    pub fn retarget(&self, color: Rgb, steps: u32) -> AnimationHandle {
        let (generation, from) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.mode = Mode::Fading(AnimationTarget {
                from_color: state.current,
                to_color: color,
                steps,
                elapsed_step: 0,
            });
            (state.generation, state.current)
        };

        debug!(
            target: "companion-sensorimotor",
            "Retarget {} -> {} over {} steps (generation {})",
            from, color, steps, generation
        );

        let task = self.runtime.spawn(run_fade(
            Arc::clone(&self.shared),
            generation,
            from,
            color,
            steps,
            self.config.step_delay,
        ));
        AnimationHandle {
            from,
            to: color,
            generation,
            task,
        }
    }

    /// Adopt a persisted color as the displayed one without writing a frame
    ///
    /// Cancels any running animation; the next fade starts from `color`.
    pub fn restore_color(&self, color: Rgb) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.mode = Mode::Idle;
        state.current = color;
    }

    /// Jump straight to `color`
    pub fn set_color(&self, color: Rgb) -> AnimationHandle {
        self.retarget(color, 0)
    }

    /// Shimmer around the current color until superseded
    pub fn start_shimmer(&self) -> AnimationHandle {
        let (generation, base) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.mode = Mode::Shimmering { base: state.current };
            (state.generation, state.current)
        };

        let task = self.runtime.spawn(run_shimmer(
            Arc::clone(&self.shared),
            generation,
            base,
            self.config.shimmer_interval,
        ));
        AnimationHandle {
            from: base,
            to: base,
            generation,
            task,
        }
    }

    /// End a shimmer by restoring the solid base color
    ///
    /// Returns `None` if no shimmer was running.
    pub fn stop_shimmer(&self) -> Option<AnimationHandle> {
        let base = match self.shared.state.lock().mode {
            Mode::Shimmering { base } => base,
            _ => return None,
        };
        Some(self.set_color(base))
    }

    /// Cancel the running animation without writing anything
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.mode = Mode::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_hal::{SimulatedLedStrip, SimulatedStripHandle};

    fn animator(step_delay_ms: u64) -> (ColorAnimator, SimulatedStripHandle) {
        let (strip, handle) = SimulatedLedStrip::new(4);
        let animator = ColorAnimator::new(
            Box::new(strip),
            AnimatorConfig {
                brightness: 255,
                step_delay: Duration::from_millis(step_delay_ms),
                shimmer_interval: Duration::from_millis(1),
            },
        )
        .unwrap();
        (animator, handle)
    }

    #[test]
    fn requires_runtime() {
        let (strip, _) = SimulatedLedStrip::new(4);
        assert!(matches!(
            ColorAnimator::new(Box::new(strip), AnimatorConfig::default()),
            Err(SensorimotorError::NoRuntime(_))
        ));
    }

    #[tokio::test]
    async fn fade_interpolates_and_snaps() {
        let (animator, strip) = animator(0);
        let target = Rgb::new(255, 255, 0);
        let outcome = animator.retarget(target, 4).wait().await;

        assert_eq!(outcome, AnimationOutcome::Completed);
        assert_eq!(
            strip.frame_colors(),
            vec![
                Rgb::new(0, 0, 0),
                Rgb::new(63, 63, 0),
                Rgb::new(127, 127, 0),
                Rgb::new(191, 191, 0),
                target,
            ]
        );
        assert_eq!(animator.current_color(), target);
        assert!(!animator.in_transition());
    }

    #[tokio::test]
    async fn brightness_scales_output_not_state() {
        let (strip, handle) = SimulatedLedStrip::new(2);
        let animator = ColorAnimator::new(
            Box::new(strip),
            AnimatorConfig {
                brightness: 100,
                ..Default::default()
            },
        )
        .unwrap();
        animator.set_color(Rgb::new(255, 0, 0)).wait().await;
        assert_eq!(handle.displayed(), vec![Rgb::new(100, 0, 0); 2]);
        assert_eq!(animator.current_color(), Rgb::new(255, 0, 0));
    }

    #[tokio::test]
    async fn write_failure_keeps_last_good_color() {
        let (animator, strip) = animator(0);
        animator.set_color(Rgb::new(0, 0, 255)).wait().await;
        strip.fail_flushes(1);
        let outcome = animator.retarget(Rgb::new(255, 255, 0), 10).wait().await;

        assert!(matches!(outcome, AnimationOutcome::Failed(_)));
        assert_eq!(animator.current_color(), Rgb::new(0, 0, 255));
        assert!(!animator.in_transition());
    }

    #[tokio::test]
    async fn stop_shimmer_restores_solid_color() {
        let (animator, strip) = animator(0);
        let base = Rgb::new(200, 100, 50);
        animator.set_color(base).wait().await;

        let shimmer = animator.start_shimmer();
        assert!(animator.is_shimmering());
        while strip.flush_count() < 5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let restore = animator.stop_shimmer().unwrap();
        assert_eq!(shimmer.wait().await, AnimationOutcome::Superseded);
        assert_eq!(restore.wait().await, AnimationOutcome::Completed);
        assert_eq!(strip.displayed(), vec![base; 4]);
        assert!(!animator.is_shimmering());
        assert!(animator.stop_shimmer().is_none());
    }

    #[tokio::test]
    async fn restored_color_starts_the_next_fade() {
        let (animator, strip) = animator(0);
        let saved = Rgb::new(0, 0, 255);
        animator.restore_color(saved);
        assert_eq!(animator.current_color(), saved);
        assert_eq!(strip.flush_count(), 0);

        let outcome = animator.retarget(Rgb::new(0, 0, 55), 2).wait().await;
        assert_eq!(outcome, AnimationOutcome::Completed);
        let frames = strip.frame_colors();
        assert_eq!(frames[0], saved);
        assert_eq!(frames.last(), Some(&Rgb::new(0, 0, 55)));
    }
}
