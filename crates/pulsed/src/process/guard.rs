use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

use pulse_config::RuntimePaths;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::files::atomic_write;
use super::registry::PidRegistry;
use super::snapshot::{LifecycleState, StateSnapshot};

/// Owns the pid record and state snapshot of the running instance.
///
/// The work loop releases both explicitly on a graceful stop. If the
/// instance unwinds through an error instead, `Drop` removes whatever is
/// left so no record outlives its process.
#[derive(Debug)]
pub(super) struct InstanceGuard {
    registry: PidRegistry,
    state_path: PathBuf,
    pid: u32,
    released: bool,
}

impl InstanceGuard {
    /// Registers `pid` and publishes the `Starting` state.
    pub(super) fn register(paths: &RuntimePaths, pid: u32) -> Result<Self, LaunchError> {
        let registry = PidRegistry::new(paths.pid_path());
        registry.register(pid)?;
        let guard = Self {
            registry,
            state_path: paths.state_path().to_path_buf(),
            pid,
            released: false,
        };
        guard.publish(LifecycleState::Starting)?;
        Ok(guard)
    }

    pub(super) fn pid(&self) -> u32 {
        self.pid
    }

    /// Writes the current lifecycle state next to the pid file.
    pub(super) fn publish(&self, state: LifecycleState) -> Result<(), LaunchError> {
        let snapshot = StateSnapshot::now(state, self.pid)?;
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        atomic_write(&self.state_path, &payload).map_err(|source| LaunchError::StateWrite {
            path: self.state_path.clone(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            status = %state,
            file = %self.state_path.display(),
            "state snapshot updated"
        );
        Ok(())
    }

    /// Clears the registry; the last step before a graceful exit.
    pub(super) fn release(&mut self) -> Result<(), LaunchError> {
        remove_snapshot(&self.state_path)?;
        self.registry.clear()?;
        self.released = true;
        Ok(())
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(error) = remove_snapshot(&self.state_path) {
            warn!(target: PROCESS_TARGET, error = %error, "failed to remove state snapshot");
        }
        if let Err(error) = self.registry.clear() {
            warn!(target: PROCESS_TARGET, error = %error, "failed to remove pid file");
        }
    }
}

fn remove_snapshot(path: &std::path::Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source: error,
        }),
        _ => Ok(()),
    }
}
