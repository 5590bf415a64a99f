use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::daemonizer::DaemonizeError;
use super::environment::EnvironmentError;
use super::signals::SignalError;

/// Errors surfaced while launching or running the detached instance.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Required operating-system facilities are unavailable.
    #[error("environment check failed: {source}")]
    Environment {
        /// Underlying environment failure.
        #[source]
        source: EnvironmentError,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing a runtime artefact failed.
    #[error("failed to remove '{path}': {source}")]
    Cleanup {
        /// Path of the artefact that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the lifecycle state snapshot failed.
    #[error("failed to write state snapshot '{path}': {source}")]
    StateWrite {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the state snapshot failed.
    #[error("failed to serialise state snapshot: {source}")]
    StateSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying system time error.
        #[source]
        source: std::time::SystemTimeError,
    },
    /// Detaching from the terminal failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Installing signal handlers failed.
    #[error("failed to route signals: {source}")]
    Signals {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
}

impl From<EnvironmentError> for LaunchError {
    fn from(source: EnvironmentError) -> Self {
        Self::Environment { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}
