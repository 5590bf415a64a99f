//! Orchestrates `start`, `stop`, `status` and `restart`.
//!
//! Controller processes never write the pid file; they only read it and
//! signal the process it names. The detached instance owns the record.

use std::io::Write;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use pulse_config::{Config, RuntimePaths};
use tracing::{info, warn};

use crate::process::{
    LaunchError, LaunchMode, LaunchOutcome, LaunchPlan, PidRegistry, ProcessSignaller,
    RegistryState, StateSnapshot, SystemSignaller, run_instance_with,
};

use super::LIFECYCLE_TARGET;
use super::error::LifecycleError;
use super::types::{LifecycleCommand, LifecycleOutput, StartOutcome, StatusReport, StopOutcome};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs an instance in the current process.
pub trait Launcher {
    /// Performs the start sequence and returns once the instance stops.
    fn launch(
        &mut self,
        mode: LaunchMode,
        paths: &RuntimePaths,
        interval: Duration,
        signaller: &dyn ProcessSignaller,
    ) -> Result<LaunchOutcome, LaunchError>;
}

/// Launcher wiring the production collaborators.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(
        &mut self,
        mode: LaunchMode,
        paths: &RuntimePaths,
        interval: Duration,
        signaller: &dyn ProcessSignaller,
    ) -> Result<LaunchOutcome, LaunchError> {
        run_instance_with(paths, interval, signaller, LaunchPlan::system(mode, paths))
    }
}

/// Timing knobs resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    pub heartbeat_interval: Duration,
    pub restart_grace: Duration,
    pub shutdown_timeout: Duration,
}

impl LifecycleTimings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            restart_grace: config.restart_grace(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Lifecycle controller over a runtime directory.
pub struct Lifecycle<P, L> {
    paths: RuntimePaths,
    timings: LifecycleTimings,
    signaller: P,
    launcher: L,
}

/// Controller using real signals and the production launcher.
pub type SystemLifecycle = Lifecycle<SystemSignaller, SystemLauncher>;

impl SystemLifecycle {
    #[must_use]
    pub fn system(config: &Config) -> Self {
        Lifecycle::new(
            RuntimePaths::from_config_readonly(config),
            LifecycleTimings::from_config(config),
            SystemSignaller,
            SystemLauncher,
        )
    }
}

impl<P, L> Lifecycle<P, L>
where
    P: ProcessSignaller,
    L: Launcher,
{
    pub fn new(paths: RuntimePaths, timings: LifecycleTimings, signaller: P, launcher: L) -> Self {
        Self {
            paths,
            timings,
            signaller,
            launcher,
        }
    }

    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    fn registry(&self) -> PidRegistry {
        PidRegistry::new(self.paths.pid_path())
    }

    /// Starts an instance unless a live one already exists.
    ///
    /// Blocks for the lifetime of the instance. In background mode only the
    /// detached child returns.
    pub fn start(&mut self, foreground: bool) -> Result<StartOutcome, LifecycleError> {
        let mode = LaunchMode::detect(foreground);
        let outcome = self.launcher.launch(
            mode,
            &self.paths,
            self.timings.heartbeat_interval,
            &self.signaller,
        )?;
        Ok(match outcome {
            LaunchOutcome::AlreadyRunning { pid } => {
                info!(target: LIFECYCLE_TARGET, pid, "start refused; instance already running");
                StartOutcome::AlreadyRunning { pid }
            }
            LaunchOutcome::Stopped(exit) => StartOutcome::Stopped(exit),
        })
    }

    /// Requests a graceful stop of the recorded instance.
    ///
    /// Succeeds once the signal is accepted; does not wait for the exit.
    pub fn stop(&self) -> Result<StopOutcome, LifecycleError> {
        let Some(pid) = self.registry().read() else {
            return Ok(StopOutcome::NotRunning);
        };
        self.signaller
            .terminate(pid)
            .map_err(|source| LifecycleError::SignalFailed { pid, source })?;
        info!(target: LIFECYCLE_TARGET, pid, "termination signal sent");
        Ok(StopOutcome::Signalled { pid })
    }

    /// Classifies the registry without modifying anything.
    pub fn status(&self) -> StatusReport {
        match self.registry().inspect(&self.signaller) {
            RegistryState::Absent => StatusReport::NotRunning,
            RegistryState::Live(pid) => {
                let state = StateSnapshot::read(self.paths.state_path())
                    .filter(|snapshot| snapshot.pid == pid)
                    .map(|snapshot| snapshot.status);
                StatusReport::Running { pid, state }
            }
            RegistryState::Stale(pid) => StatusReport::Stale { pid },
        }
    }

    /// Stops the current instance, waits for it to go away, pauses, then
    /// starts a new one.
    pub fn restart(&mut self, foreground: bool) -> Result<StartOutcome, LifecycleError> {
        match self.stop() {
            Ok(StopOutcome::Signalled { pid }) => {
                if !self.wait_for_exit(pid) {
                    warn!(
                        target: LIFECYCLE_TARGET,
                        pid,
                        timeout_ms = duration_ms(self.timings.shutdown_timeout),
                        "previous instance still registered after shutdown timeout"
                    );
                }
                thread::sleep(self.timings.restart_grace);
            }
            Ok(StopOutcome::NotRunning) => {}
            // A record naming a dead process is replaced by the start below.
            Err(LifecycleError::SignalFailed { pid, source }) => {
                warn!(
                    target: LIFECYCLE_TARGET,
                    pid,
                    error = %source,
                    "previous instance could not be signalled; starting anyway"
                );
            }
            Err(error) => return Err(error),
        }
        self.start(foreground)
    }

    /// Polls until `pid` no longer holds a live record.
    fn wait_for_exit(&self, pid: u32) -> bool {
        let deadline = Instant::now() + self.timings.shutdown_timeout;
        loop {
            match self.registry().inspect(&self.signaller) {
                RegistryState::Live(current) if current == pid => {}
                _ => return true,
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Executes `command` and renders its outcome.
    pub fn handle<W: Write, E: Write>(
        &mut self,
        command: LifecycleCommand,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        match command {
            LifecycleCommand::Start { foreground } => {
                let outcome = self.start(foreground)?;
                report_start(outcome, output)
            }
            LifecycleCommand::Restart { foreground } => {
                let outcome = self.restart(foreground)?;
                report_start(outcome, output)
            }
            LifecycleCommand::Stop => {
                match self.stop()? {
                    StopOutcome::NotRunning => {
                        output.stdout_line(format_args!("pulsed is not running"))?;
                    }
                    StopOutcome::Signalled { pid } => {
                        output.stdout_line(format_args!("pulsed stopped (pid {pid} signalled)"))?;
                    }
                }
                Ok(ExitCode::SUCCESS)
            }
            LifecycleCommand::Status => {
                output.stdout_line(format_args!("{}", self.status()))?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn report_start<W: Write, E: Write>(
    outcome: StartOutcome,
    output: &mut LifecycleOutput<W, E>,
) -> Result<ExitCode, LifecycleError> {
    match outcome {
        StartOutcome::AlreadyRunning { pid } => {
            output.stderr_line(format_args!("pulsed is already running (pid {pid})"))?;
            Ok(ExitCode::FAILURE)
        }
        StartOutcome::Stopped(exit) => {
            info!(target: LIFECYCLE_TARGET, ?exit, "instance exited");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
