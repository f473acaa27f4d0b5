// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime wiring: touch -> history -> state machine -> light and clients
//!
//! ```text
//! sensor thread ──touch──> pipeline task ──> TouchHistory
//!                               │            StatisticsService (event store)
//!                               │            EmotionalStateMachine::evaluate_history
//!                               └─> hub: touch_event
//!
//! state machine ─effect──> ColorAnimator (fade to state color)
//!               ─observer─> hub: state_change
//!               ─observer─> recorder task ──> StatisticsService
//!
//! timers: re-evaluation, statistics_update, keep-alive, snapshot + prune
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use companion_config::{CompanionConfig, MetricKind};
use companion_hal::{
    Clock, LedDriver, Rgb, SimulatedLedStrip, SimulatedStripHandle, SimulatedTouchPanel,
    SimulatedTouchSensor, SystemClock, TouchSensor,
};
use companion_io::{spawn_keep_alive, HubStateObserver, NotificationHub, Topic};
use companion_sensorimotor::{
    AnimatorConfig, ColorAnimator, RetryPolicy, SensorPoller, SensorStatus, SensorWorker,
    StateColorEffect, StatePalette,
};
use companion_services::{
    EventStore, InMemoryEventStore, Period, StatisticsService, StatisticsServiceImpl, StatsCache,
    TtlTable,
};
use companion_state_manager::{
    observer_fn, EmotionalStateMachine, RuntimeSnapshot, StateChange, StateMachineConfig,
    StateMetric, TouchEvent, TouchHistory, TouchHistoryConfig,
};
use parking_lot::RwLock;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Device I/O handed to the runtime
pub struct Hardware {
    pub sensor: Box<dyn TouchSensor>,
    pub leds: Box<dyn LedDriver>,
    pub clock: Arc<dyn Clock>,
}

impl Hardware {
    /// In-process touch panel and LED strip on the system clock
    pub fn simulated(led_count: usize) -> (Self, SimulatedTouchPanel, SimulatedStripHandle) {
        let (sensor, panel) = SimulatedTouchSensor::new();
        let (strip, strip_handle) = SimulatedLedStrip::new(led_count);
        let hardware = Self {
            sensor: Box::new(sensor),
            leds: Box::new(strip),
            clock: Arc::new(SystemClock),
        };
        (hardware, panel, strip_handle)
    }
}

enum RecorderMsg {
    Change(StateChange),
    /// Acknowledged once every earlier change is stored
    Flush(oneshot::Sender<()>),
}

/// Components shared by the pipeline, the timers and the HTTP layer
struct Shared {
    clock: Arc<dyn Clock>,
    history: Arc<TouchHistory>,
    machine: Arc<EmotionalStateMachine>,
    animator: Arc<ColorAnimator>,
    hub: Arc<NotificationHub>,
    statistics: Arc<dyn StatisticsService>,
    state_file: PathBuf,
    timestamps_kept: usize,
    retention: Duration,
    last_external_call: Option<DateTime<Utc>>,
}

impl Shared {
    async fn handle_touch(&self, event: TouchEvent) {
        self.history.record(&event);

        let state = self.machine.current_state();
        match self.statistics.record_touch(&event, state).await {
            Ok(record) => {
                self.hub.publish_json(Topic::TouchEvent, &record);
            }
            Err(e) => {
                error!(target: "companion", "Failed to store touch on sensor {}: {}", event.sensor_channel(), e);
            }
        }

        self.machine.evaluate_history(&self.history);
    }

    fn save_snapshot(&self) -> Result<()> {
        let snapshot = RuntimeSnapshot::capture(
            &self.history,
            &self.machine,
            Some(self.animator.current_color()),
            self.last_external_call,
            self.timestamps_kept,
            self.clock.now(),
        );
        snapshot
            .save_to_file(&self.state_file)
            .with_context(|| format!("Failed to save runtime state to {}", self.state_file.display()))?;
        debug!(target: "companion", "Runtime state saved to {}", self.state_file.display());
        Ok(())
    }

    async fn publish_statistics(&self) {
        if self.hub.subscriber_count() == 0 {
            return;
        }
        let snapshot = self.statistics.snapshot().await;
        self.hub.publish_json(Topic::StatisticsUpdate, &snapshot);
    }

    async fn save_and_prune(&self) {
        if let Err(e) = self.save_snapshot() {
            error!(target: "companion", "{:#}", e);
        }
        if let Err(e) = self.statistics.prune(self.retention).await {
            warn!(target: "companion", "Touch event pruning failed: {}", e);
        }
    }
}

/// The running device
pub struct CompanionRuntime {
    shared: Arc<Shared>,
    sensor_status: Arc<RwLock<SensorStatus>>,
    worker: Option<SensorWorker>,
    pipeline: Option<JoinHandle<()>>,
    recorder: mpsc::UnboundedSender<RecorderMsg>,
    tasks: Vec<JoinHandle<()>>,
    allow_manual_override: bool,
    started_at: DateTime<Utc>,
}

impl CompanionRuntime {
    /// Build every component, restore saved state and start polling
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &CompanionConfig, hardware: Hardware) -> Result<Self> {
        let Hardware { sensor, leds, clock } = hardware;

        let history = Arc::new(TouchHistory::new(
            TouchHistoryConfig {
                window: Duration::from_secs(config.touch_history.window_secs),
                day_retention_days: config.touch_history.day_retention_days,
            },
            Arc::clone(&clock),
        )?);

        let es = &config.emotional_state;
        let metric = match es.metric {
            MetricKind::CountInWindow => StateMetric::CountInWindow {
                window: es.metric_window(),
            },
            MetricKind::TouchesPerMinute => StateMetric::TouchesPerMinute {
                window: es.metric_window(),
            },
        };
        let machine = Arc::new(EmotionalStateMachine::new(
            StateMachineConfig {
                metric,
                upper_threshold: es.upper_threshold,
                lower_threshold: es.lower_threshold,
            },
            Arc::clone(&clock),
        )?);

        let animator = Arc::new(ColorAnimator::new(
            leds,
            AnimatorConfig {
                brightness: config.led.brightness,
                step_delay: es.step_delay(),
                shimmer_interval: config.led.shimmer_interval(),
            },
        )?);
        let palette = StatePalette {
            sad: rgb(es.sad_color),
            glad: rgb(es.glad_color),
        };

        // saved state first, so nothing below observes a restore
        let state_file = config.state_file_path();
        let snapshot = RuntimeSnapshot::load_or_fresh(&state_file);
        if let Some(snapshot) = &snapshot {
            snapshot.restore_into(&history, &machine);
            if let Some(color) = snapshot.last_color {
                animator.restore_color(color);
            }
        }

        let store = match config.journal_file_path() {
            Some(path) => InMemoryEventStore::open(&path, Arc::clone(&clock))
                .with_context(|| format!("Failed to open event journal {}", path.display()))?,
            None => InMemoryEventStore::new(Arc::clone(&clock)),
        };
        // the journal is written on every transition, the snapshot only periodically
        if let Some(last) = store.last_state_change() {
            if last.new_state != machine.current_state() {
                warn!(
                    target: "companion",
                    "Snapshot state {} is older than the journal, resuming in {}",
                    machine.current_state(),
                    last.new_state
                );
            }
            machine.restore_state(last.new_state, Some(last.timestamp));
        }
        let state = machine.current_state();
        store.set_initial_state(state);

        let _ = animator.retarget(palette.color_for(state), es.transition_steps);
        info!(target: "companion", "Starting in state {} ({} touches recorded)", state, history.total_count());
        let store: Arc<dyn EventStore> = Arc::new(store);

        let ttl = TtlTable::new(
            config
                .statistics
                .cache_ttl
                .entries()
                .into_iter()
                .filter_map(|(name, secs)| {
                    name.parse::<Period>()
                        .ok()
                        .map(|period| (period, Duration::from_secs(secs)))
                }),
        );
        let cache = Arc::new(StatsCache::new(ttl, Arc::clone(&clock)));
        let statistics: Arc<dyn StatisticsService> = Arc::new(StatisticsServiceImpl::new(
            store,
            cache,
            Arc::clone(&machine),
            Arc::clone(&clock),
        ));

        let hub = NotificationHub::new(config.notifications.queue_capacity)?;

        // effects run before observers: the fade starts before clients hear about it
        machine.add_effect(Arc::new(StateColorEffect::new(
            Arc::clone(&animator),
            palette,
            es.transition_steps,
        )));
        machine.register_observer(Arc::new(HubStateObserver::new(Arc::clone(&hub))));

        let (recorder, recorder_rx) = mpsc::unbounded_channel();
        let recorder_tx = recorder.clone();
        machine.register_observer(observer_fn("statistics-recorder", move |change| {
            recorder_tx
                .send(RecorderMsg::Change(change.clone()))
                .map_err(|_| "statistics recorder has stopped".into())
        }));

        let shared = Arc::new(Shared {
            clock: Arc::clone(&clock),
            history,
            machine,
            animator,
            hub,
            statistics,
            state_file,
            timestamps_kept: config.persistence.window_timestamps_kept,
            retention: Duration::from_secs(
                u64::from(config.touch_history.day_retention_days) * 24 * 60 * 60,
            ),
            last_external_call: snapshot.and_then(|s| s.last_external_call),
        });

        let mut tasks = vec![spawn_recorder(Arc::clone(&shared.statistics), recorder_rx)];
        tasks.extend(spawn_timers(&shared, config));

        let (touch_tx, touch_rx) = mpsc::unbounded_channel::<TouchEvent>();
        let pipeline = spawn_pipeline(Arc::clone(&shared), touch_rx);

        let sc = &config.sensor;
        let poller = SensorPoller::new(
            sensor,
            sc.channel_count,
            RetryPolicy {
                poll_interval: sc.poll_interval(),
                max_consecutive_failures: sc.max_consecutive_failures,
                failure_window: sc.failure_window(),
                cooldown: sc.cooldown(),
                retry_delay: sc.retry_delay(),
            },
            Arc::clone(&clock),
        )?;
        let worker = SensorWorker::spawn(poller, move |event| {
            if touch_tx.send(event).is_err() {
                warn!(target: "companion", "Touch pipeline has stopped, touch dropped");
            }
        })
        .context("Failed to start sensor thread")?;

        info!(
            target: "companion",
            "Companion runtime started ({} channels, {} LEDs)",
            sc.channel_count,
            shared.animator.pixel_count()
        );

        Ok(Self {
            sensor_status: worker.status_handle(),
            worker: Some(worker),
            pipeline: Some(pipeline),
            recorder,
            tasks,
            allow_manual_override: config.api.allow_manual_override,
            started_at: clock.now(),
            shared,
        })
    }

    pub fn history(&self) -> &Arc<TouchHistory> {
        &self.shared.history
    }

    pub fn machine(&self) -> &Arc<EmotionalStateMachine> {
        &self.shared.machine
    }

    pub fn animator(&self) -> &Arc<ColorAnimator> {
        &self.shared.animator
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.shared.hub
    }

    pub fn statistics(&self) -> &Arc<dyn StatisticsService> {
        &self.shared.statistics
    }

    pub fn sensor_status(&self) -> SensorStatus {
        self.sensor_status.read().clone()
    }

    /// Run a touch through the pipeline as if the sensor had reported it
    pub async fn ingest(&self, event: TouchEvent) {
        self.shared.handle_touch(event).await;
    }

    /// Wait until every state change observed so far is stored
    pub async fn flush_state_changes(&self) {
        let (ack, done) = oneshot::channel();
        if self.recorder.send(RecorderMsg::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub fn save_snapshot(&self) -> Result<()> {
        self.shared.save_snapshot()
    }

    /// State for the HTTP query API
    #[cfg(feature = "http")]
    pub fn api_state(&self) -> companion_api::ApiState {
        companion_api::ApiState {
            statistics: Arc::clone(&self.shared.statistics),
            machine: Arc::clone(&self.shared.machine),
            history: Arc::clone(&self.shared.history),
            animator: Arc::clone(&self.shared.animator),
            hub: Arc::clone(&self.shared.hub),
            sensor_status: Arc::clone(&self.sensor_status),
            clock: Arc::clone(&self.shared.clock),
            allow_manual_override: self.allow_manual_override,
            started_at: self.started_at,
        }
    }

    /// Stop polling, drain pending touches, store pending transitions and save state
    pub async fn shutdown(mut self) -> Result<()> {
        info!(target: "companion", "Shutting down companion runtime");

        if let Some(mut worker) = self.worker.take() {
            // joins the sensor thread, which flushes touches still in progress
            tokio::task::spawn_blocking(move || worker.stop())
                .await
                .context("Sensor thread shutdown failed")?;
        }
        if let Some(pipeline) = self.pipeline.take() {
            // the sensor sink was the only sender; the task ends once drained
            if let Err(e) = pipeline.await {
                error!(target: "companion", "Touch pipeline task failed: {}", e);
            }
        }

        self.flush_state_changes().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }

        let saved = self.shared.save_snapshot();
        self.shared.animator.cancel();
        saved?;
        info!(target: "companion", "Companion runtime stopped");
        Ok(())
    }
}

impl Drop for CompanionRuntime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }
}

fn rgb([r, g, b]: [u8; 3]) -> Rgb {
    Rgb::new(r, g, b)
}

fn spawn_pipeline(shared: Arc<Shared>, mut touches: mpsc::UnboundedReceiver<TouchEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = touches.recv().await {
            shared.handle_touch(event).await;
        }
        debug!(target: "companion", "Touch pipeline drained");
    })
}

fn spawn_recorder(
    statistics: Arc<dyn StatisticsService>,
    mut messages: mpsc::UnboundedReceiver<RecorderMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            match message {
                RecorderMsg::Change(change) => {
                    if let Err(e) = statistics.record_state_change(&change).await {
                        error!(
                            target: "companion",
                            "Failed to store transition {} -> {}: {}",
                            change.old_state,
                            change.new_state,
                            e
                        );
                    }
                }
                RecorderMsg::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    })
}

/// Run `tick` every `period`, starting one period from now
fn every<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick().await;
        }
    })
}

fn spawn_timers(shared: &Arc<Shared>, config: &CompanionConfig) -> Vec<JoinHandle<()>> {
    let evaluate = {
        let shared = Arc::clone(shared);
        // lets a quiet window decay GLAD -> SAD without new touches
        every(config.emotional_state.evaluation_interval(), move || {
            let shared = Arc::clone(&shared);
            async move {
                shared.machine.evaluate_history(&shared.history);
            }
        })
    };

    let statistics = {
        let shared = Arc::clone(shared);
        every(Duration::from_secs(config.statistics.update_interval_secs), move || {
            let shared = Arc::clone(&shared);
            async move { shared.publish_statistics().await }
        })
    };

    let persist = {
        let shared = Arc::clone(shared);
        every(Duration::from_secs(config.persistence.save_interval_secs), move || {
            let shared = Arc::clone(&shared);
            async move { shared.save_and_prune().await }
        })
    };

    let keep_alive = spawn_keep_alive(
        Arc::clone(&shared.hub),
        Duration::from_secs(config.notifications.keep_alive_secs),
    );

    vec![evaluate, statistics, persist, keep_alive]
}
