// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Aggregate endpoints: `/api/statistics/*`
//!
//! Everything here is served through the statistics cache; aggregate reads
//! never fail, a broken store shows up as zeros.

use companion_services::{Period, StateDurations, StatisticsSnapshot};
use serde::Serialize;
use serde_json::{json, Value};

use crate::common::{ApiResult, ApiState, Json, Query, QueryParams, State};

#[derive(Debug, Serialize)]
pub struct AverageDurationResponse {
    pub average_duration_ms: f64,
    pub period: Period,
    /// Served from the statistics cache
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct StateDurationsResponse {
    pub period: Period,
    /// Seconds spent in each state
    pub durations: StateDurations,
    pub cached: bool,
}

pub async fn get_all(State(state): State<ApiState>) -> Json<StatisticsSnapshot> {
    Json(state.statistics.snapshot().await)
}

/// `{period: count}` for one period, or for every period when `period=all`
pub async fn get_touch_count(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let body = match params.period_or_all(None)? {
        None => json!(state.statistics.touch_counts().await),
        Some(period) => {
            let count = state.statistics.touch_count(period, None).await.value;
            json!({ period.as_str(): count })
        }
    };
    Ok(Json(body))
}

pub async fn get_average_duration(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<AverageDurationResponse>> {
    let period = params.period(Period::AllTime)?;
    let result = state.statistics.average_duration_ms(period, None).await;
    Ok(Json(AverageDurationResponse {
        average_duration_ms: result.value,
        period,
        cached: result.cached,
    }))
}

pub async fn get_state_durations(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<StateDurationsResponse>> {
    let period = params.period(Period::Today)?;
    let result = state.statistics.state_durations(period).await;
    Ok(Json(StateDurationsResponse {
        period,
        durations: result.value,
        cached: result.cached,
    }))
}
