// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Touch data endpoints: `/api/touch/*`

use companion_services::{Period, TimeRange, TouchFilter, TouchRecord};
use serde::Serialize;

use crate::common::{ApiResult, ApiState, Json, Query, QueryParams, State};

#[derive(Debug, Serialize)]
pub struct TouchEventsResponse {
    pub events: Vec<TouchRecord>,
    /// Matching touches across all pages
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct TouchCountResponse {
    pub count: u64,
    pub period: Period,
    pub sensor_id: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct AverageDurationResponse {
    pub average_duration_ms: f64,
    pub period: Period,
    pub sensor_id: Option<u8>,
}

/// Stored touches, newest first
pub async fn get_events(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<TouchEventsResponse>> {
    let limit = params.limit(100)?;
    let offset = params.offset()?;
    let sensor_id = params.sensor_id()?;
    let period = params.period_or_all(None)?;

    let range = match period {
        Some(p) => p.range(state.clock.now()),
        None => TimeRange::all(),
    };
    let filter = TouchFilter::in_range(range).with_sensor(sensor_id);
    let events = state.statistics.touch_events(filter, limit, offset).await?;
    let total = state
        .statistics
        .touch_count(period.unwrap_or(Period::AllTime), sensor_id)
        .await
        .value;

    Ok(Json(TouchEventsResponse {
        events,
        total,
        limit,
        offset,
    }))
}

pub async fn get_count(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<TouchCountResponse>> {
    let sensor_id = params.sensor_id()?;
    let period = params.period(Period::AllTime)?;
    let count = state.statistics.touch_count(period, sensor_id).await.value;
    Ok(Json(TouchCountResponse {
        count,
        period,
        sensor_id,
    }))
}

pub async fn get_average_duration(
    State(state): State<ApiState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<AverageDurationResponse>> {
    let sensor_id = params.sensor_id()?;
    let period = params.period(Period::AllTime)?;
    let average = state
        .statistics
        .average_duration_ms(period, sensor_id)
        .await
        .value;
    Ok(Json(AverageDurationResponse {
        average_duration_ms: average,
        period,
        sensor_id,
    }))
}
