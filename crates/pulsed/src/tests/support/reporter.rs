//! Test double for [`HealthReporter`] that records lifecycle events.

use std::io;
use std::sync::Mutex;

use crate::health::HealthReporter;
use crate::process::LaunchMode;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    LaunchStarting(LaunchMode),
    StaleRecord(u32),
    InstanceRunning(u32),
    Heartbeat(u64),
    WorkFailed(String),
    StopRequested(u32),
    InstanceStopped(u32),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Events other than heartbeats, whose count depends on timing.
    #[must_use]
    pub fn milestones(&self) -> Vec<HealthEvent> {
        self.events()
            .into_iter()
            .filter(|event| !matches!(event, HealthEvent::Heartbeat(_)))
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn launch_starting(&self, mode: LaunchMode) {
        self.record(HealthEvent::LaunchStarting(mode));
    }

    fn stale_record(&self, pid: u32) {
        self.record(HealthEvent::StaleRecord(pid));
    }

    fn instance_running(&self, pid: u32) {
        self.record(HealthEvent::InstanceRunning(pid));
    }

    fn heartbeat(&self, iteration: u64) {
        self.record(HealthEvent::Heartbeat(iteration));
    }

    fn work_failed(&self, error: &io::Error) {
        self.record(HealthEvent::WorkFailed(error.to_string()));
    }

    fn stop_requested(&self, pid: u32) {
        self.record(HealthEvent::StopRequested(pid));
    }

    fn instance_stopped(&self, pid: u32) {
        self.record(HealthEvent::InstanceStopped(pid));
    }
}
