// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic keep-alive so idle transports are not timed out.

use crate::event::Topic;
use crate::hub::NotificationHub;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Publish `keep-alive` `{timestamp}` (unix seconds) every `interval`
///
/// The first message goes out one full interval after the call. The task
/// runs until aborted.
pub fn spawn_keep_alive(hub: Arc<NotificationHub>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = hub.publish(
                Topic::KeepAlive,
                json!({ "timestamp": chrono::Utc::now().timestamp() }),
            );
            trace!(
                target: "companion-io",
                "Keep-alive sent to {} clients", report.delivered
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_fires_on_interval() {
        let hub = NotificationHub::new(8).unwrap();
        let mut sub = hub.subscribe();
        let task = spawn_keep_alive(hub.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(sub.try_recv().is_none());

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event, Topic::KeepAlive);
        assert!(event.data["timestamp"].is_i64());

        task.abort();
    }
}
