//! Daemon process supervision: detachment, pid registry, signal routing and
//! the work loop run by the detached instance.

pub(crate) mod daemonizer;
pub(crate) mod environment;
mod errors;
mod files;
mod guard;
pub(crate) mod launch;
pub(crate) mod registry;
pub(crate) mod signals;
pub(crate) mod snapshot;
pub(crate) mod work;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use environment::EnvironmentError;
pub use errors::LaunchError;
pub use launch::{
    LaunchMode, LaunchOutcome, LaunchPlan, ProcessControl, ServiceDeps, run_instance_with,
};
pub use registry::{PidRegistry, ProcessSignaller, RegistryState, SystemSignaller};
pub use signals::{
    LoggingSignalHooks, PendingSignals, SignalError, SignalEvent, SignalHooks, SignalSource,
    SystemSignals,
};
pub use snapshot::{LifecycleState, StateSnapshot};
pub use work::{JobFileWork, LoopExit, WorkUnit};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const FOREGROUND_ENV_VAR: &str = "PULSE_FOREGROUND";
