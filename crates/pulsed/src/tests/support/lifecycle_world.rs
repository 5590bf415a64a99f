//! Lifecycle test world shared across BDD scenarios.
//!
//! Instances run on background threads inside the test process, so the pid
//! they register is the test's own pid and "alive" probes succeed for real.

use std::fs;
use std::process::{self, Command};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pulse_config::RuntimePaths;
use signal_hook::consts::signal::SIGTERM;
use tempfile::TempDir;

use crate::lifecycle::{
    Lifecycle, LifecycleError, LifecycleTimings, StartOutcome, StatusReport, StopOutcome,
};
use crate::process::{LifecycleState, PidRegistry};

use super::{
    RecordingHealthReporter, RecordingSignaller, ScriptedSignals, TestDaemonizer, TestLauncher,
};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

const TIMINGS: LifecycleTimings = LifecycleTimings {
    heartbeat_interval: Duration::from_millis(20),
    restart_grace: Duration::from_millis(10),
    shutdown_timeout: Duration::from_secs(2),
};

pub type StepResult = Result<(), String>;
type InstanceResult = Result<StartOutcome, LifecycleError>;

pub struct LifecycleWorld {
    temp_dir: TempDir,
    paths: RuntimePaths,
    signals: ScriptedSignals,
    signaller: RecordingSignaller,
    pub daemonizer: TestDaemonizer,
    pub reporter: Arc<RecordingHealthReporter>,
    running: Vec<JoinHandle<InstanceResult>>,
    finished: Vec<InstanceResult>,
    pub second_start: Option<InstanceResult>,
    pub last_stop: Option<Result<StopOutcome, LifecycleError>>,
    pub stale_pid: Option<u32>,
}

impl LifecycleWorld {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create runtime directory");
        let paths = RuntimePaths::in_directory(temp_dir.path());
        let signals = ScriptedSignals::default();
        Self {
            temp_dir,
            paths,
            signaller: RecordingSignaller::new(signals.clone()),
            signals,
            daemonizer: TestDaemonizer::default(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            running: Vec::new(),
            finished: Vec::new(),
            second_start: None,
            last_stop: None,
            stale_pid: None,
        }
    }

    fn lifecycle(&self) -> Lifecycle<RecordingSignaller, TestLauncher> {
        Lifecycle::new(
            self.paths.clone(),
            TIMINGS,
            self.signaller.clone(),
            TestLauncher {
                daemonizer: self.daemonizer.clone(),
                signals: self.signals.clone(),
                reporter: self.reporter.clone(),
            },
        )
    }

    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    pub fn registry(&self) -> PidRegistry {
        PidRegistry::new(self.paths.pid_path())
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.signaller.terminated()
    }

    /// Writes the pid of a process that has already been reaped.
    pub fn write_stale_record(&mut self) -> StepResult {
        let mut child = Command::new("true")
            .spawn()
            .map_err(|error| format!("spawn helper: {error}"))?;
        child
            .wait()
            .map_err(|error| format!("reap helper: {error}"))?;
        let pid = child.id();
        fs::write(self.paths.pid_path(), format!("{pid}\n"))
            .map_err(|error| format!("write stale record: {error}"))?;
        self.stale_pid = Some(pid);
        Ok(())
    }

    /// Starts an instance on a background thread and waits until it runs.
    pub fn start_instance(&mut self) -> StepResult {
        let mut lifecycle = self.lifecycle();
        let heartbeats = self.heartbeat_count();
        self.running
            .push(thread::spawn(move || lifecycle.start(false)));
        self.wait_until_running()?;
        self.wait_for(|world| world.heartbeat_count() > heartbeats)
    }

    /// Restarts on a background thread and waits for the new instance.
    pub fn restart_instance(&mut self) -> StepResult {
        let mut lifecycle = self.lifecycle();
        let previous_runs = self.running_count();
        self.running
            .push(thread::spawn(move || lifecycle.restart(false)));
        self.wait_for(|world| world.running_count() > previous_runs)?;
        self.wait_until_running()
    }

    pub fn start_again(&mut self) {
        self.second_start = Some(self.lifecycle().start(false));
    }

    pub fn stop(&mut self) {
        self.last_stop = Some(self.lifecycle().stop());
    }

    pub fn status(&self) -> StatusReport {
        self.lifecycle().status()
    }

    /// Waits for every instance thread to finish.
    pub fn join_instances(&mut self) -> StepResult {
        self.wait_for(|world| world.running.iter().all(JoinHandle::is_finished))?;
        for handle in self.running.drain(..) {
            let result = handle
                .join()
                .map_err(|_| "instance thread panicked".to_string())?;
            self.finished.push(result);
        }
        Ok(())
    }

    pub fn finished(&self) -> &[InstanceResult] {
        &self.finished
    }

    fn heartbeat_count(&self) -> usize {
        self.reporter
            .events()
            .iter()
            .filter(|event| matches!(event, super::HealthEvent::Heartbeat(_)))
            .count()
    }

    fn running_count(&self) -> usize {
        self.reporter
            .milestones()
            .iter()
            .filter(|event| matches!(event, super::HealthEvent::InstanceRunning(_)))
            .count()
    }

    fn wait_until_running(&self) -> StepResult {
        self.wait_for(|world| {
            matches!(
                world.status(),
                StatusReport::Running {
                    state: Some(LifecycleState::Running),
                    ..
                }
            )
        })
    }

    fn wait_for(&self, condition: impl Fn(&Self) -> bool) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if condition(self) {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(format!(
            "condition not reached within {WAIT_TIMEOUT:?} in {}",
            self.temp_dir.path().display()
        ))
    }
}

impl Drop for LifecycleWorld {
    fn drop(&mut self) {
        // Unblock any instance left running by a failed scenario.
        if !self.running.is_empty() {
            self.signals.deliver(SIGTERM);
        }
    }
}

pub fn own_pid() -> u32 {
    process::id()
}
