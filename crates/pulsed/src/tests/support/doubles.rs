//! Process-level doubles: no forking, no real signals.

use std::collections::VecDeque;
use std::os::raw::c_int;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::errno::Errno;
use pulse_config::RuntimePaths;
use signal_hook::consts::signal::SIGTERM;

use crate::health::HealthReporter;
use crate::lifecycle::Launcher;
use crate::process::{
    DaemonizeError, Daemonizer, JobFileWork, LaunchError, LaunchMode, LaunchOutcome, LaunchPlan,
    LoggingSignalHooks, ProcessControl, ProcessSignaller, ServiceDeps, SignalError, SignalSource,
    SystemSignaller, run_instance_with,
};

use super::RecordingHealthReporter;

/// Counts detachment requests and stays in the current process.
#[derive(Clone, Debug, Default)]
pub struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl TestDaemonizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Signal queue shared between the scenario and the running instance.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSignals {
    queue: Arc<Mutex<VecDeque<c_int>>>,
}

impl ScriptedSignals {
    pub fn deliver(&self, signal: c_int) {
        self.queue
            .lock()
            .expect("signal queue mutex poisoned")
            .push_back(signal);
    }
}

impl SignalSource for ScriptedSignals {
    fn install(&mut self) -> Result<(), SignalError> {
        Ok(())
    }

    fn pending(&mut self) -> Vec<c_int> {
        self.queue
            .lock()
            .expect("signal queue mutex poisoned")
            .drain(..)
            .collect()
    }
}

/// Probes liveness for real but routes termination of this process into
/// the scripted queue. Other processes are never signalled.
#[derive(Clone, Debug, Default)]
pub struct RecordingSignaller {
    signals: ScriptedSignals,
    terminated: Arc<Mutex<Vec<u32>>>,
}

impl RecordingSignaller {
    pub fn new(signals: ScriptedSignals) -> Self {
        Self {
            signals,
            terminated: Arc::default(),
        }
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated
            .lock()
            .expect("signaller mutex poisoned")
            .clone()
    }
}

impl ProcessSignaller for RecordingSignaller {
    fn is_alive(&self, pid: u32) -> bool {
        SystemSignaller.is_alive(pid)
    }

    fn terminate(&self, pid: u32) -> Result<(), Errno> {
        self.terminated
            .lock()
            .expect("signaller mutex poisoned")
            .push(pid);
        if pid == process::id() {
            self.signals.deliver(SIGTERM);
            Ok(())
        } else if self.is_alive(pid) {
            Err(Errno::EPERM)
        } else {
            Err(Errno::ESRCH)
        }
    }
}

/// Launcher running the real start sequence with the doubles above.
#[derive(Clone)]
pub struct TestLauncher {
    pub daemonizer: TestDaemonizer,
    pub signals: ScriptedSignals,
    pub reporter: Arc<RecordingHealthReporter>,
}

impl Launcher for TestLauncher {
    fn launch(
        &mut self,
        mode: LaunchMode,
        paths: &RuntimePaths,
        interval: Duration,
        signaller: &dyn ProcessSignaller,
    ) -> Result<LaunchOutcome, LaunchError> {
        let reporter = self.reporter.clone() as Arc<dyn HealthReporter>;
        let plan = LaunchPlan {
            process: ProcessControl {
                mode,
                daemonizer: self.daemonizer.clone(),
                signals: self.signals.clone(),
            },
            services: ServiceDeps {
                reporter,
                hooks: Box::new(LoggingSignalHooks),
                work: JobFileWork::new(paths.job_path()),
            },
        };
        run_instance_with(paths, interval, signaller, plan)
    }
}
