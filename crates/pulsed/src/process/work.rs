//! Cooperative work loop run by the detached instance.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::health::HealthReporter;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::guard::InstanceGuard;
use super::signals::{SignalHooks, SignalRouter, SignalSource};
use super::snapshot::LifecycleState;

/// One iteration's worth of periodic work.
pub trait WorkUnit: Send {
    /// Performs the work. Errors are reported and the loop carries on.
    fn perform(&mut self) -> io::Result<()>;
}

/// Appends a `<seconds>.<micros> job` line to the job file per iteration.
#[derive(Debug, Clone)]
pub struct JobFileWork {
    path: PathBuf,
}

impl JobFileWork {
    /// Builds a work unit appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WorkUnit for JobFileWork {
    fn perform(&mut self) -> io::Result<()> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(io::Error::other)?;
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        // The detached instance runs with a cleared umask.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options.open(&self.path)?;
        writeln!(
            file,
            "{}.{:06} job",
            elapsed.as_secs(),
            elapsed.subsec_micros()
        )
    }
}

/// How the work loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A termination signal was observed and the registry cleared.
    GracefulStop {
        /// Work iterations completed before the stop.
        iterations: u64,
    },
}

pub(super) struct WorkLoop<S, W> {
    pub(super) router: SignalRouter<S>,
    pub(super) hooks: Box<dyn SignalHooks>,
    pub(super) work: W,
    pub(super) reporter: Arc<dyn HealthReporter>,
    pub(super) interval: Duration,
}

impl<S, W> WorkLoop<S, W>
where
    S: SignalSource,
    W: WorkUnit,
{
    /// Runs until a graceful stop is observed, then releases `guard`.
    pub(super) fn run(mut self, mut guard: InstanceGuard) -> Result<LoopExit, LaunchError> {
        let mut iterations = 0_u64;
        loop {
            self.router.dispatch();
            let pending = self.router.pending();
            if pending.take_reload() {
                self.hooks.on_reload();
            }
            if pending.take_custom() {
                self.hooks.on_custom();
            }
            if pending.take_stop() {
                self.reporter.stop_requested(guard.pid());
                guard.publish(LifecycleState::StoppingGracefully)?;
                guard.release()?;
                self.reporter.instance_stopped(guard.pid());
                return Ok(LoopExit::GracefulStop { iterations });
            }

            if let Err(error) = self.work.perform() {
                self.reporter.work_failed(&error);
            }
            iterations += 1;
            self.reporter.heartbeat(iterations);
            debug!(
                target: PROCESS_TARGET,
                interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
                "sleeping until next iteration"
            );
            thread::sleep(self.interval);
        }
    }
}
