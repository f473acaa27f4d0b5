// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

// HTTP server implementation (Axum)
//
// Routing, middleware and the state shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use companion_hal::Clock;
use companion_io::NotificationHub;
use companion_sensorimotor::{ColorAnimator, SensorStatus};
use companion_services::StatisticsService;
use companion_state_manager::{EmotionalStateMachine, TouchHistory};
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::endpoints::{emotional_state, health, live, statistics, touch};
use crate::middleware::create_cors_layer;

/// Application state shared across all HTTP handlers
#[derive(Clone)]
pub struct ApiState {
    pub statistics: Arc<dyn StatisticsService>,
    pub machine: Arc<EmotionalStateMachine>,
    pub history: Arc<TouchHistory>,
    pub animator: Arc<ColorAnimator>,
    pub hub: Arc<NotificationHub>,
    /// Last status published by the sensor thread
    pub sensor_status: Arc<RwLock<SensorStatus>>,
    pub clock: Arc<dyn Clock>,
    /// Enables `POST /api/emotional-state/set/{state}`
    pub allow_manual_override: bool,
    pub started_at: DateTime<Utc>,
}

/// HTTP server options that do not belong in [`ApiState`]
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub cors_origins: Vec<String>,
}

/// Create the main HTTP server application
pub fn create_http_server(state: ApiState, options: &HttpOptions) -> Router {
    Router::new()
        .route("/health", get(health::get_health))
        .nest("/api", create_api_router())
        .route("/ws/stats", get(live::ws_stats))
        .fallback(|| async {
            tracing::warn!(target: "companion-api", "Unmatched request - 404 Not Found");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": "Not Found", "code": "NOT_FOUND"})),
            )
                .into_response()
        })
        .with_state(state)
        .layer(create_cors_layer(&options.cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::span!(
                        target: "companion-api",
                        tracing::Level::DEBUG,
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::debug!(target: "companion-api", "Incoming request: {} {}", request.method(), request.uri());
                })
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    tracing::debug!(
                        target: "companion-api",
                        "Response: status={}, latency={:?}",
                        response.status(),
                        latency
                    );
                })
                .on_failure(|_error: tower_http::classify::ServerErrorsFailureClass, latency: std::time::Duration, _span: &tracing::Span| {
                    tracing::error!(target: "companion-api", "Request failed, latency={:?}", latency);
                }),
        )
}

/// `/api/*` routes
fn create_api_router() -> Router<ApiState> {
    Router::new()
        // ===== EMOTIONAL STATE =====
        .route("/emotional-state/current", get(emotional_state::get_current))
        .route("/emotional-state/history", get(emotional_state::get_history))
        .route("/emotional-state/set/:state", post(emotional_state::post_set_state))
        // ===== TOUCH DATA =====
        .route("/touch/events", get(touch::get_events))
        .route("/touch/count", get(touch::get_count))
        .route("/touch/duration/average", get(touch::get_average_duration))
        // ===== STATISTICS =====
        .route("/statistics/all", get(statistics::get_all))
        .route("/statistics/touch-count", get(statistics::get_touch_count))
        .route("/statistics/average-duration", get(statistics::get_average_duration))
        .route("/statistics/state-durations", get(statistics::get_state_durations))
        // ===== LIVE UPDATES =====
        .route("/events", get(live::sse_events))
}
