// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! HTTP contract tests against an in-memory stack

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use companion_api::{create_http_server, ApiState, HttpOptions};
use companion_hal::{Clock, ManualClock, SimulatedLedStrip};
use companion_io::{NotificationHub, Topic};
use companion_sensorimotor::{AnimatorConfig, ColorAnimator, SensorStatus};
use companion_services::{
    InMemoryEventStore, StatisticsService, StatisticsServiceImpl, StatsCache, TtlTable,
};
use companion_state_manager::{
    EmotionalState, EmotionalStateMachine, StateMachineConfig, TouchEvent, TouchHistory,
    TouchHistoryConfig,
};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Fixture {
    state: ApiState,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new(allow_manual_override: bool) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let history =
            Arc::new(TouchHistory::new(TouchHistoryConfig::default(), dyn_clock.clone()).unwrap());
        let machine = Arc::new(
            EmotionalStateMachine::new(StateMachineConfig::default(), dyn_clock.clone()).unwrap(),
        );
        let (strip, _handle) = SimulatedLedStrip::new(4);
        let animator = Arc::new(ColorAnimator::new(Box::new(strip), AnimatorConfig::default()).unwrap());
        let store = Arc::new(InMemoryEventStore::new(dyn_clock.clone()));
        let cache = Arc::new(StatsCache::new(TtlTable::default(), dyn_clock.clone()));
        let statistics = Arc::new(StatisticsServiceImpl::new(
            store,
            cache,
            machine.clone(),
            dyn_clock.clone(),
        ));

        let state = ApiState {
            statistics,
            machine,
            history,
            animator,
            hub: NotificationHub::new(16).unwrap(),
            sensor_status: Arc::new(RwLock::new(SensorStatus::default())),
            clock: dyn_clock,
            allow_manual_override,
            started_at: start,
        };
        Self { state, clock }
    }

    fn app(&self) -> Router {
        create_http_server(self.state.clone(), &HttpOptions::default())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store and count a touch that ended just before now
    async fn touch(&self, channel: u8) {
        let event = TouchEvent::new(channel, self.now() - Duration::seconds(1), 0.5).unwrap();
        self.state.history.record(&event);
        self.state
            .statistics
            .record_touch(&event, self.state.machine.current_state())
            .await
            .unwrap();
    }
}

async fn request_json(app: Router, method: &str, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(path)
        .method(method)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = if body_bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!(null))
    };
    (status, json)
}

// ============================================================================
// QUERY ENDPOINTS
// ============================================================================

#[tokio::test]
async fn test_health_reports_sensor_and_state() {
    let fixture = Fixture::new(true);
    let (status, body) = request_json(fixture.app(), "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["sensor"]["initialized"], false);
    assert_eq!(body["emotional_state"]["state"], "sad");
}

#[tokio::test]
async fn test_touch_counts_and_sensor_filter() {
    let fixture = Fixture::new(true);
    for channel in [1, 1, 1, 2, 2] {
        fixture.touch(channel).await;
    }

    let (status, body) = request_json(fixture.app(), "GET", "/api/touch/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);
    assert_eq!(body["period"], "all_time");

    let (_, body) = request_json(fixture.app(), "GET", "/api/touch/count?sensor_id=1&period=hour").await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["sensor_id"], 1);

    let (_, body) = request_json(fixture.app(), "GET", "/api/touch/events?limit=2").await;
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 5);

    let (_, body) = request_json(fixture.app(), "GET", "/api/touch/duration/average?sensor_id=2").await;
    assert_eq!(body["average_duration_ms"], 500.0);
}

#[tokio::test]
async fn test_invalid_query_parameters_are_400() {
    let fixture = Fixture::new(true);
    for path in [
        "/api/touch/count?sensor_id=12",
        "/api/touch/events?limit=0",
        "/api/touch/events?limit=abc",
        "/api/statistics/average-duration?period=decade",
    ] {
        let (status, body) = request_json(fixture.app(), "GET", path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(body["code"], "INVALID_INPUT", "{}", path);
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn test_statistics_touch_count_periods() {
    let fixture = Fixture::new(true);
    fixture.touch(0).await;
    fixture.touch(3).await;

    let (_, body) = request_json(fixture.app(), "GET", "/api/statistics/touch-count").await;
    assert_eq!(body["all_time"], 2);
    assert_eq!(body["hour"], 2);
    assert!(body.get("week").is_some());

    let (_, body) = request_json(fixture.app(), "GET", "/api/statistics/touch-count?period=hour").await;
    assert_eq!(body, json!({"hour": 2}));
}

#[tokio::test]
async fn test_average_duration_reports_cache_use() {
    let fixture = Fixture::new(true);
    fixture.touch(0).await;

    let path = "/api/statistics/average-duration?period=hour";
    let (_, first) = request_json(fixture.app(), "GET", path).await;
    let (_, second) = request_json(fixture.app(), "GET", path).await;

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(second["average_duration_ms"], 500.0);

    // a write invalidates the entry
    fixture.touch(0).await;
    let (_, third) = request_json(fixture.app(), "GET", path).await;
    assert_eq!(third["cached"], false);
}

#[tokio::test]
async fn test_statistics_all_snapshot() {
    let fixture = Fixture::new(true);
    fixture.touch(5).await;

    let (status, body) = request_json(fixture.app(), "GET", "/api/statistics/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["touch_count"]["all_time"], 1);
    assert_eq!(body["touch_count"]["hour"], 1);
    assert_eq!(body["emotional_state"]["current"], "sad");
}

// ============================================================================
// EMOTIONAL STATE
// ============================================================================

#[tokio::test]
async fn test_manual_override_forbidden_when_disabled() {
    let fixture = Fixture::new(false);
    let (status, body) =
        request_json(fixture.app(), "POST", "/api/emotional-state/set/glad").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(fixture.state.machine.current_state(), EmotionalState::Sad);
}

#[tokio::test]
async fn test_manual_override_changes_state() {
    let fixture = Fixture::new(true);

    let (status, body) =
        request_json(fixture.app(), "POST", "/api/emotional-state/set/glad").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["previous_state"], "sad");
    assert_eq!(body["new_state"], "glad");

    let (_, body) = request_json(fixture.app(), "POST", "/api/emotional-state/set/glad").await;
    assert_eq!(body["changed"], false);

    let (status, _) = request_json(fixture.app(), "POST", "/api/emotional-state/set/happy").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = request_json(fixture.app(), "GET", "/api/emotional-state/current").await;
    assert_eq!(body["state"], "glad");
}

#[tokio::test]
async fn test_state_history_lists_recorded_transitions() {
    let fixture = Fixture::new(true);
    let change = fixture.state.machine.force_state(EmotionalState::Glad).unwrap();
    fixture.state.statistics.record_state_change(&change).await.unwrap();

    let (status, body) = request_json(fixture.app(), "GET", "/api/emotional-state/history").await;
    assert_eq!(status, StatusCode::OK);
    let transitions = body["transitions"].as_array().unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0]["old_state"], "sad");
    assert_eq!(transitions[0]["new_state"], "glad");
    assert_eq!(body["limit"], 10);
}

#[tokio::test]
async fn test_current_state_counts_window() {
    let fixture = Fixture::new(true);
    for _ in 0..3 {
        fixture.touch(0).await;
    }
    let (_, body) = request_json(fixture.app(), "GET", "/api/emotional-state/current").await;
    assert_eq!(body["touch_count"], 3);
    assert_eq!(body["metric"], 3.0);
    assert_eq!(body["in_transition"], false);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let fixture = Fixture::new(true);
    let (status, body) = request_json(fixture.app(), "GET", "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// ============================================================================
// LIVE UPDATES
// ============================================================================

async fn next_text(body: &mut Body) -> String {
    let frame = body.frame().await.unwrap().unwrap();
    String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
}

#[tokio::test]
async fn test_sse_sends_snapshot_then_hub_events() {
    let fixture = Fixture::new(true);
    let request = Request::builder()
        .uri("/api/events")
        .body(Body::empty())
        .unwrap();
    let response = fixture.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(fixture.state.hub.subscriber_count(), 1);

    let mut body = response.into_body();
    assert!(next_text(&mut body).await.starts_with("event: statistics_update\ndata: {"));
    assert!(next_text(&mut body).await.starts_with("event: state_change\ndata: {"));

    fixture.state.hub.publish(Topic::TouchEvent, json!({"sensor_id": 4}));
    assert_eq!(
        next_text(&mut body).await,
        "event: touch_event\ndata: {\"sensor_id\":4}\n\n"
    );

    drop(body);
    assert_eq!(fixture.state.hub.subscriber_count(), 0);
}

#[tokio::test]
async fn test_websocket_streams_json_frames() {
    use tokio_tungstenite::tungstenite::Message;

    let fixture = Fixture::new(true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = fixture.app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/stats", addr))
        .await
        .unwrap();

    let Some(Ok(Message::Text(first))) = ws.next().await else {
        panic!("expected a text frame");
    };
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["event"], "statistics_update");

    fixture.state.hub.publish(Topic::StateChange, json!({"new_state": "glad"}));
    let Some(Ok(Message::Text(second))) = ws.next().await else {
        panic!("expected a text frame");
    };
    let second: Value = serde_json::from_str(&second).unwrap();
    assert_eq!(second, json!({"event": "state_change", "data": {"new_state": "glad"}}));

    drop(ws);
    for _ in 0..100 {
        if fixture.state.hub.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(fixture.state.hub.subscriber_count(), 0);
}
