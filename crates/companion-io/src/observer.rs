// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bridges state machine transitions onto the `state_change` topic.

use crate::event::Topic;
use crate::hub::NotificationHub;
use companion_state_manager::{ObserverError, StateChange, StateObserver};
use std::sync::Arc;

pub struct HubStateObserver {
    hub: Arc<NotificationHub>,
}

impl HubStateObserver {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self { hub }
    }
}

impl StateObserver for HubStateObserver {
    fn name(&self) -> &str {
        "notification-hub"
    }

    fn on_state_change(&self, change: &StateChange) -> Result<(), ObserverError> {
        let data = serde_json::to_value(change)?;
        self.hub.publish(Topic::StateChange, data);
        Ok(())
    }
}
