// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Platform implementations of the HAL traits.

/// In-process touch panel and LED strip (no hardware required)
#[cfg(feature = "simulated")]
pub mod simulated;
