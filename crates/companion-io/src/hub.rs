// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Notification hub (server-side publish to N live clients)
//!
//! Each subscriber owns a bounded queue. `publish` only ever `try_send`s:
//! a full queue drops the event for that subscriber alone, a closed queue
//! removes the subscriber. Producers (sensor pipeline, state machine,
//! statistics refresh) never wait on a client.

use crate::event::{Event, Topic};
use crate::{IoError, IoResult};
use futures_util::Stream;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Subscriber identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-publish delivery outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
    /// Subscribers found disconnected and removed
    pub closed: usize,
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
}

struct Subscriber {
    sender: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

/// Fan-out of live updates to every connected client
pub struct NotificationHub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    queue_capacity: usize,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl NotificationHub {
    /// Create a hub whose subscribers each buffer at most `queue_capacity` events
    pub fn new(queue_capacity: usize) -> IoResult<Arc<Self>> {
        if queue_capacity == 0 {
            return Err(IoError::InvalidConfig(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Register a new subscriber
    ///
    /// The returned [`Subscription`] unsubscribes when dropped, so a
    /// transport only has to drop it on disconnect.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let total = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(
                id,
                Subscriber {
                    sender,
                    dropped: AtomicU64::new(0),
                },
            );
            subscribers.len()
        };
        debug!(
            target: "companion-io",
            "Client {} connected, total clients: {}", id, total
        );
        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };
        match removed {
            Some(subscriber) => {
                debug!(
                    target: "companion-io",
                    "Client {} disconnected ({} events dropped), total clients: {}",
                    id,
                    subscriber.dropped.load(Ordering::Relaxed),
                    total
                );
                true
            }
            None => false,
        }
    }

    /// Drop every subscriber; their streams end after the queued events
    pub fn disconnect_all(&self) -> usize {
        let removed = std::mem::take(&mut *self.subscribers.write()).len();
        if removed > 0 {
            debug!(target: "companion-io", "Disconnected {} live client(s)", removed);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Offer `data` under `topic` to every subscriber without waiting
    pub fn publish(&self, topic: Topic, data: Value) -> PublishReport {
        self.publish_event(Event::new(topic, data))
    }

    /// Serialize `payload` and publish it
    pub fn publish_json<T: Serialize>(&self, topic: Topic, payload: &T) -> PublishReport {
        match serde_json::to_value(payload) {
            Ok(data) => self.publish(topic, data),
            Err(e) => {
                warn!(target: "companion-io", "Could not encode {} payload: {}", topic, e);
                PublishReport::default()
            }
        }
    }

    pub fn publish_event(&self, event: Event) -> PublishReport {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.event;
        let event = Arc::new(event);
        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                match subscriber.sender.try_send(Arc::clone(&event)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            target: "companion-io",
                            "Queue full for client {}, {} event dropped", id, topic
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            report.closed = closed.len();
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                debug!(target: "companion-io", "Removed disconnected client {}", id);
            }
        }

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// A live subscription; unsubscribes on drop
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Event>>,
    hub: Weak<NotificationHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Arc<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
