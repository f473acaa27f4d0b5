// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dedicated polling thread.
//!
//! The touch driver blocks on bus I/O, so the poller runs on its own OS
//! thread and hands completed touches to a sink (normally an unbounded
//! channel into the async pipeline). Stopping wakes the thread immediately,
//! closes touches still in progress, and returns them through the same sink.

use crate::poller::{SensorPoller, SensorStatus};
use companion_state_manager::TouchEvent;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Handle to a running [`SensorPoller`] thread
pub struct SensorWorker {
    running: Arc<AtomicBool>,
    status: Arc<RwLock<SensorStatus>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SensorWorker {
    /// Start polling
    ///
    /// # Arguments
    /// * `poller` - Owned by the thread from now on
    /// * `sink` - Receives every completed touch, in order
    pub fn spawn<F>(mut poller: SensorPoller, sink: F) -> std::io::Result<Self>
    where
        F: Fn(TouchEvent) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let status = Arc::new(RwLock::new(poller.status()));

        let thread_running = Arc::clone(&running);
        let thread_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("companion-sensor".to_string())
            .spawn(move || {
                info!(target: "companion-sensorimotor", "Sensor polling started");

                while thread_running.load(Ordering::Acquire) {
                    for event in poller.poll() {
                        sink(event);
                    }
                    *thread_status.write() = poller.status();
                    thread::park_timeout(poller.next_delay());
                }

                let drained = poller.drain_active();
                if !drained.is_empty() {
                    info!(
                        target: "companion-sensorimotor",
                        "Flushing {} touch(es) still in progress",
                        drained.len()
                    );
                }
                for event in drained {
                    sink(event);
                }
                *thread_status.write() = poller.status();
                info!(target: "companion-sensorimotor", "Sensor polling stopped");
            })?;

        Ok(Self {
            running,
            status,
            thread_handle: Some(handle),
        })
    }

    /// Status as of the last poll
    pub fn status(&self) -> SensorStatus {
        self.status.read().clone()
    }

    /// Shared status cell (for readers that outlive `&self`)
    pub fn status_handle(&self) -> Arc<RwLock<SensorStatus>> {
        Arc::clone(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop polling and wait for the thread to flush active touches
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!(target: "companion-sensorimotor", "Sensor polling thread panicked");
            }
        }
    }
}

impl Drop for SensorWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::RetryPolicy;
    use companion_hal::{SimulatedTouchSensor, SystemClock};
    use parking_lot::Mutex;
    use std::time::Duration;

    #[test]
    fn stop_flushes_active_touches() {
        let (sensor, panel) = SimulatedTouchSensor::new();
        let poller = SensorPoller::new(
            Box::new(sensor),
            12,
            RetryPolicy {
                poll_interval: Duration::from_millis(1),
                ..Default::default()
            },
            Arc::new(SystemClock),
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        panel.press(7);
        let mut worker =
            SensorWorker::spawn(poller, move |event| sink_seen.lock().push(event)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while worker.status().active_touches.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(worker.status().active_touches, vec![7]);

        worker.stop();
        assert!(!worker.is_running());
        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sensor_channel(), 7);
    }
}
