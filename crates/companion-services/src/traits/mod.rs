// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service trait definitions.

Adapters (HTTP API, runtime pipeline) depend on these traits, not on the
implementations.
*/

pub mod event_store;
pub mod statistics_service;

pub use event_store::EventStore;
pub use statistics_service::StatisticsService;
