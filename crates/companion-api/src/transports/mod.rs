// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

// Transport adapters

pub mod http;
