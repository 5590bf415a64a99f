//! Lifecycle state and its advisory on-disk snapshot.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::errors::LaunchError;

/// Lifecycle of a single instance.
///
/// Only ever held inside the detached process. "Not running" has no
/// variant: other processes observe it as the absence of a pid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Running,
    StoppingGracefully,
}

impl LifecycleState {
    /// Stable lowercase name used in the snapshot and status output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::StoppingGracefully => "stopping_gracefully",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// JSON document published next to the pid file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub status: LifecycleState,
    pub pid: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl StateSnapshot {
    pub(crate) fn now(status: LifecycleState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status,
            pid,
            timestamp,
        })
    }

    /// Reads a snapshot, treating missing or malformed files as absent.
    #[must_use]
    pub fn read(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}
