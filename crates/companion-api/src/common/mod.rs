// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

// Common types used across all endpoints

pub mod error;
pub mod params;

pub use crate::transports::http::server::ApiState;
pub use axum::extract::{Path, Query, State};
pub use axum::response::Json;
pub use error::{ApiError, ApiErrorCode};
pub use params::QueryParams;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
