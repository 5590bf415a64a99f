//! Pre-flight checks run by `start` before anything irreversible happens.
//!
//! Failures here are reported to the invoking terminal, since detachment has
//! not happened yet and stderr is still attached.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use pulse_config::RuntimePaths;

use super::PROCESS_TARGET;

/// Device the detached instance redirects its standard streams to.
pub(crate) const NULL_DEVICE: &str = "/dev/null";

/// Reasons the current environment cannot host a detached instance.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// fork, setsid and signal delivery are Unix facilities.
    #[error("daemonisation requires a Unix platform")]
    UnsupportedPlatform,
    /// The null device cannot take over the standard streams.
    #[error("null device '{path}' is not usable: {source}")]
    NullDevice {
        /// Device path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The runtime directory cannot be created.
    #[error("runtime directory '{path}' is not usable: {source}")]
    RuntimeDirectory {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Verifies the platform, the null device and the runtime directory.
pub(crate) fn check_environment(paths: &RuntimePaths) -> Result<(), EnvironmentError> {
    check_environment_with(Path::new(NULL_DEVICE), paths)
}

fn check_environment_with(
    null_device: &Path,
    paths: &RuntimePaths,
) -> Result<(), EnvironmentError> {
    if !cfg!(unix) {
        return Err(EnvironmentError::UnsupportedPlatform);
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(null_device)
        .map_err(|source| EnvironmentError::NullDevice {
            path: null_device.to_path_buf(),
            source,
        })?;
    fs::create_dir_all(paths.runtime_dir()).map_err(|source| {
        EnvironmentError::RuntimeDirectory {
            path: paths.runtime_dir().to_path_buf(),
            source,
        }
    })?;
    debug!(
        target: PROCESS_TARGET,
        runtime = %paths.runtime_dir().display(),
        "environment check passed"
    );
    Ok(())
}
