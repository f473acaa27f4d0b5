// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors raised by hardware collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HalError {
    /// Device was used before a successful `initialize()`
    #[error("Device not initialized: {0}")]
    NotInitialized(String),

    /// Bus transfer failed (I2C/SPI NAK, timeout, short read)
    #[error("Bus I/O error: {0}")]
    Io(String),

    /// Pixel index outside the strip
    #[error("Pixel index {index} out of range (strip has {count} pixels)")]
    PixelOutOfRange { index: usize, count: usize },

    /// Device is gone or was never present
    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

pub type HalResult<T> = Result<T, HalError>;
