// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Companion I/O
//!
//! Live-update fan-out shared by the SSE and WebSocket transports.
//!
//! ```text
//! state machine ──┐
//! touch pipeline ─┼─► NotificationHub ──try_send──► [queue] ─► client 1
//! stats refresh ──┤                     ──try_send──► [queue] ─► client 2
//! keep-alive ─────┘                     ──try_send──► [queue] ─► client N
//! ```

pub mod event;
pub mod hub;
pub mod keep_alive;
pub mod observer;

pub use event::{Event, Topic};
pub use hub::{HubStats, NotificationHub, PublishReport, SubscriberId, Subscription};
pub use keep_alive::spawn_keep_alive;
pub use observer::HubStateObserver;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IoError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type IoResult<T> = Result<T, IoError>;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
