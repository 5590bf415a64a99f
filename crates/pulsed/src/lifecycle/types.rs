//! Lifecycle command types and output abstractions.

use std::fmt;
use std::io::Write;

use super::LifecycleError;
use crate::process::{LifecycleState, LoopExit};

/// Supported lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start { foreground: bool },
    Stop,
    Restart { foreground: bool },
    Status,
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { .. } => formatter.write_str("start"),
            Self::Stop => formatter.write_str("stop"),
            Self::Restart { .. } => formatter.write_str("restart"),
            Self::Status => formatter.write_str("status"),
        }
    }
}

/// Output handle abstracting over stdout/stderr writers.
pub struct LifecycleOutput<W: Write, E: Write> {
    pub stdout: W,
    pub stderr: E,
}

impl<W: Write, E: Write> LifecycleOutput<W, E> {
    pub fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stdout.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stdout.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stdout.flush().map_err(LifecycleError::Io)
    }

    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        self.stderr.write_fmt(args).map_err(LifecycleError::Io)?;
        self.stderr.write_all(b"\n").map_err(LifecycleError::Io)?;
        self.stderr.flush().map_err(LifecycleError::Io)
    }
}

/// What `start` achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Another live instance holds the registry.
    AlreadyRunning { pid: u32 },
    /// This process ran the instance until it stopped gracefully.
    Stopped(LoopExit),
}

/// What `stop` achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No pid record exists; nothing was signalled.
    NotRunning,
    /// The termination signal was accepted for `pid`.
    Signalled { pid: u32 },
}

/// Classification reported by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReport {
    NotRunning,
    /// A live instance; `state` comes from the snapshot when it matches.
    Running {
        pid: u32,
        state: Option<LifecycleState>,
    },
    /// The pid record points at a process that no longer exists.
    Stale { pid: u32 },
}

impl fmt::Display for StatusReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => formatter.write_str("pulsed is not running"),
            Self::Running {
                pid,
                state: Some(state),
            } => write!(formatter, "pulsed is running (pid {pid}, state {state})"),
            Self::Running { pid, state: None } => {
                write!(formatter, "pulsed is running (pid {pid})")
            }
            Self::Stale { pid } => write!(
                formatter,
                "warning: pid file present but process {pid} is not alive"
            ),
        }
    }
}
