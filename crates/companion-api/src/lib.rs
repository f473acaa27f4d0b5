// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

// Companion query API
//
// JSON endpoints over the statistics service and the state machine, plus
// live updates from the notification hub over SSE and WebSocket.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod endpoints;
pub mod middleware;
pub mod transports;

// Re-export commonly used types
pub use common::{ApiError, ApiErrorCode, ApiResult, QueryParams};
pub use transports::http::{create_http_server, ApiState, HttpOptions};
