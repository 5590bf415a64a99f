//! Structured health reporting for instance lifecycle events.

use std::io;
use std::sync::Arc;

use crate::process::LaunchMode;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before the launch sequence begins.
    fn launch_starting(&self, mode: LaunchMode);

    /// Invoked when a pid record points at a process that no longer exists.
    fn stale_record(&self, pid: u32);

    /// Invoked once the instance has registered itself and entered the loop.
    fn instance_running(&self, pid: u32);

    /// Invoked after every completed work iteration.
    fn heartbeat(&self, iteration: u64);

    /// Invoked when a unit of work fails; the loop keeps running.
    fn work_failed(&self, error: &io::Error);

    /// Invoked when the loop observes a graceful-stop request.
    fn stop_requested(&self, pid: u32);

    /// Invoked after the registry has been cleared on a graceful stop.
    fn instance_stopped(&self, pid: u32);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn launch_starting(&self, mode: LaunchMode) {
        (**self).launch_starting(mode);
    }

    fn stale_record(&self, pid: u32) {
        (**self).stale_record(pid);
    }

    fn instance_running(&self, pid: u32) {
        (**self).instance_running(pid);
    }

    fn heartbeat(&self, iteration: u64) {
        (**self).heartbeat(iteration);
    }

    fn work_failed(&self, error: &io::Error) {
        (**self).work_failed(error);
    }

    fn stop_requested(&self, pid: u32) {
        (**self).stop_requested(pid);
    }

    fn instance_stopped(&self, pid: u32) {
        (**self).instance_stopped(pid);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn launch_starting(&self, mode: LaunchMode) {
        tracing::info!(
            target: "pulsed::health",
            event = "launch_starting",
            ?mode,
            "starting instance"
        );
    }

    fn stale_record(&self, pid: u32) {
        tracing::warn!(
            target: "pulsed::health",
            event = "stale_record",
            pid,
            "pid file refers to a process that no longer exists; replacing it"
        );
    }

    fn instance_running(&self, pid: u32) {
        tracing::info!(
            target: "pulsed::health",
            event = "instance_running",
            pid,
            "instance running"
        );
    }

    fn heartbeat(&self, iteration: u64) {
        tracing::info!(
            target: "pulsed::health",
            event = "heartbeat",
            iteration,
            "still alive"
        );
    }

    fn work_failed(&self, error: &io::Error) {
        tracing::warn!(
            target: "pulsed::health",
            event = "work_failed",
            error = %error,
            "unit of work failed"
        );
    }

    fn stop_requested(&self, pid: u32) {
        tracing::info!(
            target: "pulsed::health",
            event = "stop_requested",
            pid,
            "graceful stop requested"
        );
    }

    fn instance_stopped(&self, pid: u32) {
        tracing::info!(
            target: "pulsed::health",
            event = "instance_stopped",
            pid,
            "instance stopped"
        );
    }
}
