// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

// Endpoint handlers, one module per route group

pub mod emotional_state;
pub mod health;
pub mod live;
pub mod statistics;
pub mod touch;
