//! Implements the detachment sequence for the `pulsed` process.
//!
//! The steps run once, in order: fork (the parent exits with status 0),
//! start a new session, change into the runtime directory, clear the umask,
//! and point stdin, stdout and stderr at the null device.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process;

use nix::errno::Errno;
use nix::sys::stat::{Mode, umask};
use nix::unistd::{ForkResult, chdir, close, dup2, fork, setsid};
use pulse_config::RuntimePaths;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;
use super::environment::NULL_DEVICE;

const STANDARD_STREAMS: [RawFd; 3] = [0, 1, 2];

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background.
    ///
    /// Returns only in the detached process; the invoking process exits.
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the detachment sequence.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// The child process could not be created.
    #[error("fork failed: {0}")]
    Fork(#[source] Errno),
    /// The child could not become a session leader.
    #[error("failed to start a new session: {0}")]
    Session(#[source] Errno),
    /// Changing into the runtime directory failed.
    #[error("failed to change directory to '{path}': {source}")]
    WorkDir {
        /// Target directory.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The null device could not be opened.
    #[error("failed to open '{path}': {source}")]
    NullDevice {
        /// Device path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A standard stream could not be redirected.
    #[error("failed to redirect descriptor {fd}: {source}")]
    Redirect {
        /// Descriptor being replaced.
        fd: RawFd,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Daemoniser performing the classic fork/setsid sequence via `nix`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            runtime = %paths.runtime_dir().display(),
            "daemonising into background"
        );
        // SAFETY: the process is single-threaded here; signal routing and the
        // work loop are only set up after detachment.
        match unsafe { fork() }.map_err(DaemonizeError::Fork)? {
            ForkResult::Parent { child } => {
                info!(
                    target: PROCESS_TARGET,
                    child = child.as_raw(),
                    "detached child spawned; parent exiting"
                );
                process::exit(0);
            }
            ForkResult::Child => {}
        }
        setsid().map_err(DaemonizeError::Session)?;
        chdir(paths.runtime_dir()).map_err(|source| DaemonizeError::WorkDir {
            path: paths.runtime_dir().to_path_buf(),
            source,
        })?;
        umask(Mode::empty());
        redirect_standard_streams(Path::new(NULL_DEVICE))?;
        info!(
            target: PROCESS_TARGET,
            pid = process::id(),
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}

fn redirect_standard_streams(null_device: &Path) -> Result<(), DaemonizeError> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open(null_device)
        .map_err(|source| DaemonizeError::NullDevice {
            path: null_device.to_path_buf(),
            source,
        })?;
    // Ownership moves to raw handling: if a standard stream was already
    // closed, the device may have landed on one of the targets.
    let null_fd = null.into_raw_fd();
    for fd in STANDARD_STREAMS {
        if fd != null_fd {
            dup2(null_fd, fd).map_err(|source| DaemonizeError::Redirect { fd, source })?;
        }
    }
    if !STANDARD_STREAMS.contains(&null_fd) {
        close(null_fd).map_err(|source| DaemonizeError::Redirect {
            fd: null_fd,
            source,
        })?;
    }
    Ok(())
}
