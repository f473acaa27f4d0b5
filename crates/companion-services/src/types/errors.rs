// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service layer error types.

Transport-agnostic errors that adapters map to HTTP status codes.
*/

use thiserror::Error;

/// Service layer errors (transport-agnostic)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Invalid input parameters (400 in HTTP)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted (403 in HTTP)
    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    /// Event store read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal service error (500 in HTTP)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Storage(format!("journal encoding: {}", err))
    }
}

impl From<companion_state_manager::StateError> for ServiceError {
    fn from(err: companion_state_manager::StateError) -> Self {
        use companion_state_manager::StateError;
        match err {
            StateError::InvalidChannel { .. }
            | StateError::InvalidDuration(_)
            | StateError::UnknownState(_) => ServiceError::InvalidInput(err.to_string()),
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}
