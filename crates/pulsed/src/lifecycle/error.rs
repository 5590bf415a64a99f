//! Error types for lifecycle commands.

use std::io;

use nix::errno::Errno;
use thiserror::Error;

use crate::process::LaunchError;

/// Errors raised while executing lifecycle commands.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
    #[error("stop failed, process {pid} may not exist: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: Errno,
    },
    #[error(transparent)]
    Launch(#[from] LaunchError),
}
