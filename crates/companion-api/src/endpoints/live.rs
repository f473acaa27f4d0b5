// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live updates: `GET /api/events` (SSE) and `GET /ws/stats` (WebSocket)
//!
//! Both transports subscribe to the notification hub before building their
//! initial snapshot, so nothing published in between is lost. A client that
//! disconnects drops its [`Subscription`] and is unsubscribed.
//!
//! [`Subscription`]: companion_io::Subscription

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::Response;
use companion_io::{Event, Topic};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use super::emotional_state::current_state;
use crate::common::{ApiState, State};

fn payload<T: Serialize>(topic: Topic, body: &T) -> Event {
    let data = serde_json::to_value(body).unwrap_or_else(|e| {
        warn!(target: "companion-api", "Could not encode initial {}: {}", topic, e);
        Value::Null
    });
    Event::new(topic, data)
}

async fn statistics_event(state: &ApiState) -> Event {
    payload(Topic::StatisticsUpdate, &state.statistics.snapshot().await)
}

fn to_sse(event: &Event) -> SseEvent {
    SseEvent::default()
        .event(event.event.as_str())
        .data(event.data.to_string())
}

// ============================================================================
// SERVER-SENT EVENTS
// ============================================================================

/// Initial `statistics_update` and `state_change`, then every hub event
pub async fn sse_events(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.hub.subscribe();
    debug!(target: "companion-api", "SSE client {} connected", subscription.id());

    let initial = vec![
        Arc::new(statistics_event(&state).await),
        Arc::new(payload(Topic::StateChange, &current_state(&state))),
    ];
    let events = stream::iter(initial)
        .chain(subscription)
        .map(|event| Ok(to_sse(&event)));

    Sse::new(events)
}

// ============================================================================
// WEBSOCKET
// ============================================================================

pub async fn ws_stats(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: ApiState) {
    let mut subscription = state.hub.subscribe();
    let id = subscription.id();
    debug!(target: "companion-api", "WebSocket client {} connected", id);

    let initial = statistics_event(&state).await;
    if socket.send(Message::Text(initial.to_json())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if socket.send(Message::Text(event.to_json())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // pings are answered by axum, client text is ignored
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(target: "companion-api", "WebSocket client {} disconnected", id);
}
