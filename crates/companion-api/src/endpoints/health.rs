// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Liveness endpoint: `/health`

use chrono::{DateTime, Utc};
use companion_io::HubStats;
use companion_sensorimotor::SensorStatus;
use companion_state_manager::StateInfo;
use serde::Serialize;

use crate::common::{ApiState, Json, State};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while the sensor is not initialized
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
    pub sensor: SensorStatus,
    pub emotional_state: StateInfo,
    pub live_clients: HubStats,
}

/// Process, sensor and state machine health
pub async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let now = state.clock.now();
    let sensor = state.sensor_status.read().clone();
    let status = if sensor.initialized { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: crate::VERSION,
        uptime_secs: (now - state.started_at).num_seconds().max(0),
        timestamp: now,
        sensor,
        emotional_state: state.machine.info(),
        live_clients: state.hub.stats(),
    })
}
