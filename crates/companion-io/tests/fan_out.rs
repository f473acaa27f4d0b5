// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Slow or vanished clients never hold up the publisher or other clients.

use companion_io::{NotificationHub, Topic};
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn full_queue_drops_for_that_subscriber_only() {
    let hub = NotificationHub::new(2).unwrap();
    let mut fast_a = hub.subscribe();
    let mut fast_b = hub.subscribe();
    let mut stalled = hub.subscribe();

    // fill the stalled client's queue
    hub.publish(Topic::TouchEvent, json!(1));
    hub.publish(Topic::TouchEvent, json!(2));
    fast_a.recv().await.unwrap();
    fast_a.recv().await.unwrap();
    fast_b.recv().await.unwrap();
    fast_b.recv().await.unwrap();

    let started = Instant::now();
    let report = hub.publish(Topic::StateChange, json!({"new_state": "glad"}));
    assert!(started.elapsed() < Duration::from_millis(50));

    assert_eq!(report.delivered, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.closed, 0);

    assert_eq!(fast_a.recv().await.unwrap().event, Topic::StateChange);
    assert_eq!(fast_b.recv().await.unwrap().event, Topic::StateChange);

    // the stalled client still has its two old events, not the dropped one
    assert_eq!(stalled.recv().await.unwrap().data, json!(1));
    assert_eq!(stalled.recv().await.unwrap().data, json!(2));
    assert!(stalled.try_recv().is_none());
    assert_eq!(hub.subscriber_count(), 3);
}

#[tokio::test]
async fn churned_connections_do_not_accumulate() {
    let hub = NotificationHub::new(4).unwrap();
    for _ in 0..100 {
        let sub = hub.subscribe();
        hub.publish(Topic::KeepAlive, json!({}));
        drop(sub);
    }
    assert_eq!(hub.subscriber_count(), 0);

    let report = hub.publish(Topic::KeepAlive, json!({}));
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn subscription_is_a_stream() {
    use futures_util::StreamExt;

    let hub = NotificationHub::new(4).unwrap();
    let sub = hub.subscribe();
    hub.publish(Topic::StatisticsUpdate, json!({"touch_count": {"all_time": 1}}));
    hub.publish(Topic::KeepAlive, json!({}));

    let topics: Vec<Topic> = sub.take(2).map(|e| e.event).collect().await;
    assert_eq!(topics, vec![Topic::StatisticsUpdate, Topic::KeepAlive]);
}
