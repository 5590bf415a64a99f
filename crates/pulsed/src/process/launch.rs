//! Sequences the start path: environment check, singleton check,
//! detachment, signal installation, registration and the work loop.

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use pulse_config::RuntimePaths;
use tracing::info;

use crate::health::{HealthReporter, StructuredHealthReporter};

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::environment::check_environment;
use super::errors::LaunchError;
use super::guard::InstanceGuard;
use super::registry::{PidRegistry, ProcessSignaller, RegistryState};
use super::signals::{LoggingSignalHooks, SignalHooks, SignalRouter, SignalSource, SystemSignals};
use super::snapshot::LifecycleState;
use super::work::{JobFileWork, LoopExit, WorkLoop, WorkUnit};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET};

/// Launch mode for the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Stay attached to the terminal; used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    /// Picks the mode from an explicit request or `PULSE_FOREGROUND`.
    #[must_use]
    pub fn detect(foreground: bool) -> Self {
        if foreground || env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators needed to control the instance lifecycle.
pub struct ProcessControl<D, S> {
    pub mode: LaunchMode,
    pub daemonizer: D,
    pub signals: S,
}

/// Services driven by the work loop.
pub struct ServiceDeps<W> {
    pub reporter: Arc<dyn HealthReporter>,
    pub hooks: Box<dyn SignalHooks>,
    pub work: W,
}

/// Collaborators required to launch an instance.
pub struct LaunchPlan<D, S, W> {
    pub process: ProcessControl<D, S>,
    pub services: ServiceDeps<W>,
}

impl LaunchPlan<SystemDaemonizer, SystemSignals, JobFileWork> {
    /// Production collaborators for the given mode and runtime layout.
    #[must_use]
    pub fn system(mode: LaunchMode, paths: &RuntimePaths) -> Self {
        Self {
            process: ProcessControl {
                mode,
                daemonizer: SystemDaemonizer::new(),
                signals: SystemSignals::new(),
            },
            services: ServiceDeps {
                reporter: Arc::new(StructuredHealthReporter::new()),
                hooks: Box::new(LoggingSignalHooks),
                work: JobFileWork::new(paths.job_path()),
            },
        }
    }
}

/// Result of a start attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// A live instance already holds the registry; nothing was started.
    AlreadyRunning {
        /// Pid of the live instance.
        pid: u32,
    },
    /// The instance ran and stopped gracefully.
    Stopped(LoopExit),
}

/// Runs an instance with injected collaborators.
///
/// Returns once the work loop ends. In background mode the invoking process
/// never returns from the detachment step.
pub fn run_instance_with<D, S, W>(
    paths: &RuntimePaths,
    interval: Duration,
    signaller: &dyn ProcessSignaller,
    plan: LaunchPlan<D, S, W>,
) -> Result<LaunchOutcome, LaunchError>
where
    D: Daemonizer,
    S: SignalSource,
    W: WorkUnit,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        signals,
    } = process;
    let ServiceDeps {
        reporter,
        hooks,
        work,
    } = services;

    reporter.launch_starting(mode);
    check_environment(paths)?;
    match PidRegistry::new(paths.pid_path()).inspect(signaller) {
        RegistryState::Live(pid) => return Ok(LaunchOutcome::AlreadyRunning { pid }),
        RegistryState::Stale(pid) => reporter.stale_record(pid),
        RegistryState::Absent => {}
    }

    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize(paths)?;
    }
    let mut router = SignalRouter::new(signals);
    router.install()?;
    let guard = InstanceGuard::register(paths, process::id())?;
    guard.publish(LifecycleState::Running)?;
    reporter.instance_running(guard.pid());

    let exit = WorkLoop {
        router,
        hooks,
        work,
        reporter,
        interval,
    }
    .run(guard)?;
    info!(
        target: PROCESS_TARGET,
        ?exit,
        "shutdown sequence completed"
    );
    Ok(LaunchOutcome::Stopped(exit))
}
