// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Query-string parsing with `400` errors in the API's JSON shape.

use super::{ApiError, ApiResult};
use companion_services::Period;
use companion_state_manager::MAX_CHANNELS;
use serde::Deserialize;

/// Largest page any list endpoint returns
pub const MAX_LIMIT: usize = 1000;

/// Raw query parameters shared by the list/aggregate endpoints
///
/// Kept as strings so malformed values produce a JSON `400` instead of a
/// plain-text extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sensor_id: Option<String>,
    pub period: Option<String>,
}

impl QueryParams {
    pub fn limit(&self, default: usize) -> ApiResult<usize> {
        let Some(raw) = self.limit.as_deref() else {
            return Ok(default);
        };
        match raw.trim().parse::<usize>() {
            Ok(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
            _ => Err(ApiError::invalid_input(format!(
                "limit must be an integer between 1 and {}, got '{}'",
                MAX_LIMIT, raw
            ))),
        }
    }

    pub fn offset(&self) -> ApiResult<usize> {
        let Some(raw) = self.offset.as_deref() else {
            return Ok(0);
        };
        raw.trim().parse::<usize>().map_err(|_| {
            ApiError::invalid_input(format!("offset must be a non-negative integer, got '{}'", raw))
        })
    }

    pub fn sensor_id(&self) -> ApiResult<Option<u8>> {
        let Some(raw) = self.sensor_id.as_deref() else {
            return Ok(None);
        };
        match raw.trim().parse::<u8>() {
            Ok(id) if id < MAX_CHANNELS => Ok(Some(id)),
            _ => Err(ApiError::invalid_input(format!(
                "sensor_id must be between 0 and {}, got '{}'",
                MAX_CHANNELS - 1,
                raw
            ))),
        }
    }

    pub fn period(&self, default: Period) -> ApiResult<Period> {
        match self.period.as_deref() {
            None => Ok(default),
            Some(raw) => raw.parse::<Period>().map_err(ApiError::from),
        }
    }

    /// `None` when the caller asked for every period (`period=all`)
    pub fn period_or_all(&self, default: Option<Period>) -> ApiResult<Option<Period>> {
        match self.period.as_deref() {
            None => Ok(default),
            Some(raw) if raw.trim().eq_ignore_ascii_case("all") => Ok(None),
            Some(raw) => raw.parse::<Period>().map(Some).map_err(ApiError::from),
        }
    }
}
