//! Derives runtime artefact paths shared by the controller and the daemon.
//!
//! The runtime directory houses the pid file, the lifecycle state snapshot,
//! the log file and the job output. The controller issuing `stop`/`status`
//! and the detached instance must agree on this layout, so both derive it
//! from the same configuration.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const PID_FILE: &str = "pulsed.pid";
const STATE_FILE: &str = "pulsed.state";
const LOG_FILE: &str = "pulsed.log";
const JOB_FILE: &str = "pulsed.jobs";

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    pid_path: PathBuf,
    state_path: PathBuf,
    log_path: PathBuf,
    job_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths and makes sure the runtime directory exists.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let paths = Self::from_config_readonly(config);
        fs::create_dir_all(&paths.runtime_dir).map_err(|source| {
            RuntimePathsError::RuntimeDirectory {
                path: paths.runtime_dir.clone(),
                source,
            }
        })?;
        Ok(paths)
    }

    /// Derives runtime paths without touching the filesystem.
    ///
    /// Used by read-only commands such as `status`, which must not create the
    /// runtime directory as a side effect.
    pub fn from_config_readonly(config: &Config) -> Self {
        Self::in_directory(config.runtime_dir())
    }

    /// Lays out the artefacts inside an explicit directory.
    pub fn in_directory(runtime_dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = runtime_dir.into();
        Self {
            pid_path: runtime_dir.join(PID_FILE),
            state_path: runtime_dir.join(STATE_FILE),
            log_path: runtime_dir.join(LOG_FILE),
            job_path: runtime_dir.join(JOB_FILE),
            runtime_dir,
        }
    }

    /// Directory holding runtime artefacts; also the daemon's working directory.
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the PID file.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the lifecycle state snapshot.
    pub fn state_path(&self) -> &Path {
        self.state_path.as_path()
    }

    /// Path to the append-only daemon log.
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }

    /// Path to the append-only job output written by the work loop.
    pub fn job_path(&self) -> &Path {
        self.job_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
