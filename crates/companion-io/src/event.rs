// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live-update event envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One topic per kind of live update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "touch_event")]
    TouchEvent,
    #[serde(rename = "state_change")]
    StateChange,
    #[serde(rename = "statistics_update")]
    StatisticsUpdate,
    #[serde(rename = "keep-alive")]
    KeepAlive,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::TouchEvent => "touch_event",
            Topic::StateChange => "state_change",
            Topic::StatisticsUpdate => "statistics_update",
            Topic::KeepAlive => "keep-alive",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{event, data}` as delivered to every transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: Topic,
    pub data: Value,
}

impl Event {
    pub fn new(event: Topic, data: Value) -> Self {
        Self { event, data }
    }

    /// JSON text frame (WebSocket)
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"event\":\"{}\",\"data\":null}}", self.event.as_str())
        })
    }

    /// `event: <topic>\ndata: <json>\n\n` (Server-Sent Events)
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event.as_str(), self.data)
    }
}
