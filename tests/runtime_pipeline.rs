// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runtime tests on simulated hardware

use chrono::{Duration as ChronoDuration, Utc};
use companion::config::CompanionConfig;
use companion::hal::Rgb;
use companion::io::Topic;
use companion::services::Period;
use companion::state_manager::{EmotionalState, RuntimeSnapshot, TouchEvent};
use companion::{CompanionRuntime, Hardware};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn test_config(data_dir: &Path) -> CompanionConfig {
    let mut config = CompanionConfig::default();
    config.system.data_dir = data_dir.to_path_buf();
    config.emotional_state.upper_threshold = 3.0;
    config.emotional_state.lower_threshold = 1.0;
    config.emotional_state.transition_steps = 5;
    config.emotional_state.transition_duration_ms = 50;
    config.led.led_count = 4;
    config
}

fn touch(channel: u8) -> TouchEvent {
    TouchEvent::new(channel, Utc::now() - ChronoDuration::seconds(1), 0.25).unwrap()
}

/// Poll `check` for up to two seconds
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_touches_drive_state_and_notifications() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();
    let mut sub = runtime.hub().subscribe();

    for channel in [0, 4, 7] {
        runtime.ingest(touch(channel)).await;
    }
    assert_eq!(runtime.machine().current_state(), EmotionalState::Glad);

    let topics: Vec<Topic> = std::iter::from_fn(|| sub.try_recv())
        .map(|event| event.event)
        .collect();
    assert_eq!(
        topics,
        vec![
            Topic::TouchEvent,
            Topic::TouchEvent,
            Topic::TouchEvent,
            Topic::StateChange
        ]
    );

    runtime.flush_state_changes().await;
    let history = runtime.statistics().state_history(10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].new_state, EmotionalState::Glad);

    let count = runtime.statistics().touch_count(Period::AllTime, None).await;
    assert_eq!(count.value, 3);

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_survives_restart() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
        let runtime = CompanionRuntime::start(&config, hardware).unwrap();
        for channel in [1, 2, 3] {
            runtime.ingest(touch(channel)).await;
        }
        assert_eq!(runtime.machine().current_state(), EmotionalState::Glad);
        runtime.shutdown().await.unwrap();
    }
    assert!(config.state_file_path().exists());

    let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();
    assert_eq!(runtime.machine().current_state(), EmotionalState::Glad);
    assert_eq!(runtime.history().total_count(), 3);

    // touches and the transition come back from the journal
    let count = runtime.statistics().touch_count(Period::AllTime, None).await;
    assert_eq!(count.value, 3);
    let history = runtime.statistics().state_history(10, 0).await.unwrap();
    assert_eq!(history.len(), 1);

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sensor_touches_reach_the_pipeline() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let (hardware, panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();

    assert!(eventually(|| runtime.sensor_status().initialized).await);

    panel.press(2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    panel.release(2);

    assert!(eventually(|| runtime.history().total_count() == 1).await);
    let events = runtime
        .statistics()
        .touch_events(Default::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sensor_id, 2);
    assert!(events[0].duration_ms >= 50);

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_records_touch_in_progress() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let (hardware, panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();

    assert!(eventually(|| runtime.sensor_status().initialized).await);
    panel.press(9);
    assert!(eventually(|| runtime.sensor_status().active_touches == vec![9]).await);

    runtime.shutdown().await.unwrap();

    let snapshot = RuntimeSnapshot::load_from_file(&config.state_file_path()).unwrap();
    assert_eq!(snapshot.total_touches, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_fades_from_saved_color() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let [r, g, b] = config.emotional_state.glad_color;
    let glad = Rgb::new(r, g, b);

    {
        let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
        let runtime = CompanionRuntime::start(&config, hardware).unwrap();
        runtime.machine().force_state(EmotionalState::Glad).unwrap();
        let animator = runtime.animator();
        assert!(eventually(|| animator.current_color() == glad && !animator.in_transition()).await);
        runtime.shutdown().await.unwrap();
    }

    let (hardware, _panel, strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();
    assert!(eventually(|| !strip.frame_colors().is_empty()).await);
    // the first frame shows the saved color, not black
    assert_eq!(
        strip.frame_colors()[0],
        glad.with_brightness(config.led.brightness)
    );

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_journal_overrides_stale_snapshot_state() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let state_file = config.state_file_path();

    let entered = {
        let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
        let runtime = CompanionRuntime::start(&config, hardware).unwrap();
        runtime.save_snapshot().unwrap();
        let stale = std::fs::read(&state_file).unwrap();

        let change = runtime.machine().force_state(EmotionalState::Glad).unwrap();
        runtime.shutdown().await.unwrap();
        // crash before the next periodic save
        std::fs::write(&state_file, stale).unwrap();
        change.timestamp
    };

    let (hardware, _panel, _strip) = Hardware::simulated(config.led.led_count);
    let runtime = CompanionRuntime::start(&config, hardware).unwrap();
    let info = runtime.machine().info();
    assert_eq!(info.state, EmotionalState::Glad);
    assert_eq!(info.since, Some(entered));

    assert!(runtime.machine().force_state(EmotionalState::Glad).is_none());
    let change = runtime.machine().force_state(EmotionalState::Sad).unwrap();
    assert!(change.timestamp > entered);
    runtime.flush_state_changes().await;

    let history = runtime.statistics().state_history(10, 0).await.unwrap();
    let states: Vec<EmotionalState> = history.iter().map(|c| c.new_state).collect();
    assert_eq!(states, vec![EmotionalState::Sad, EmotionalState::Glad]);

    runtime.shutdown().await.unwrap();
}
