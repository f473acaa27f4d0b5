// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Emotional state endpoints: `/api/emotional-state/*`

use chrono::{DateTime, Utc};
use companion_hal::Rgb;
use companion_services::StateChangeRecord;
use companion_state_manager::EmotionalState;
use serde::Serialize;
use tracing::info;

use crate::common::{ApiError, ApiResult, ApiState, Json, Path, Query, QueryParams, State};

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CurrentStateResponse {
    pub state: EmotionalState,
    pub in_transition: bool,
    /// Touches inside the evaluation window
    pub touch_count: usize,
    /// Value the thresholds are compared against
    pub metric: f64,
    pub color: Rgb,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StateHistoryResponse {
    pub transitions: Vec<StateChangeRecord>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct SetStateResponse {
    pub success: bool,
    pub new_state: EmotionalState,
    pub previous_state: EmotionalState,
    /// False when the device was already in the requested state
    pub changed: bool,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Build the current-state body (also the SSE `state_change` snapshot)
pub fn current_state(state: &ApiState) -> CurrentStateResponse {
    let config = state.machine.config();
    CurrentStateResponse {
        state: state.machine.current_state(),
        in_transition: state.animator.in_transition(),
        touch_count: state.history.count_since(config.metric.window()),
        metric: config.metric.measure(&state.history),
        color: state.animator.current_color(),
        timestamp: state.clock.now(),
    }
}

// ============================================================================
// ENDPOINTS
// ============================================================================

pub async fn get_current(State(state): State<ApiState>) -> Json<CurrentStateResponse> {
    Json(current_state(&state))
}

/// Recorded transitions, newest first
pub async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<StateHistoryResponse>> {
    let limit = params.limit(10)?;
    let offset = params.offset()?;
    let transitions = state.statistics.state_history(limit, offset).await?;
    Ok(Json(StateHistoryResponse {
        transitions,
        limit,
        offset,
    }))
}

/// Manual override (development/test only)
pub async fn post_set_state(
    State(state): State<ApiState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<SetStateResponse>> {
    if !state.allow_manual_override {
        return Err(ApiError::forbidden(
            "Manual state override is disabled in this environment",
        ));
    }
    let target: EmotionalState = raw.parse().map_err(|_| {
        ApiError::invalid_input(format!("Invalid state '{}', expected 'sad' or 'glad'", raw))
    })?;

    let previous = state.machine.current_state();
    let response = match state.machine.force_state(target) {
        Some(change) => {
            info!(target: "companion-api", "Manual override {} -> {}", change.old_state, change.new_state);
            SetStateResponse {
                success: true,
                new_state: change.new_state,
                previous_state: change.old_state,
                changed: true,
                timestamp: change.timestamp,
                message: format!("State changed from {} to {}", change.old_state, change.new_state),
            }
        }
        None => SetStateResponse {
            success: true,
            new_state: target,
            previous_state: previous,
            changed: false,
            timestamp: state.clock.now(),
            message: format!("Already {}", target),
        },
    };
    Ok(Json(response))
}
