// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service implementations.
*/

pub mod memory_store;
pub mod statistics_service_impl;

pub use memory_store::InMemoryEventStore;
pub use statistics_service_impl::StatisticsServiceImpl;
