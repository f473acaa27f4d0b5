// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # companion-observability
//!
//! Logging setup shared by every companion binary and test harness.
//!
//! Provides consistent `tracing` configuration across the workspace with
//! per-crate debug flag support (`--debug-companion-sensorimotor`, `--debug-all`).
//!
//! ## Features
//! - `file-logging`: JSON log files in timestamped run folders with retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Log targets used across the workspace, one per crate
pub const KNOWN_CRATES: &[&str] = &[
    "companion",
    "companion-api",
    "companion-config",
    "companion-hal",
    "companion-io",
    "companion-sensorimotor",
    "companion-services",
    "companion-state-manager",
];
