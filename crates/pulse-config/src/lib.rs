//! Shared configuration for the `pulsed` daemon and its lifecycle commands.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then a
//! configuration file (`--config-path`, `PULSE_CONFIG_PATH` or the usual
//! discovery locations), then `PULSE_*` environment variables, then CLI
//! flags. Every field is optional; the accessors on [`Config`] apply the
//! defaults from [`defaults`] so callers never deal with unset values.

use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod runtime;

pub use defaults::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LOG_FILTER, DEFAULT_RESTART_GRACE,
    DEFAULT_SHUTDOWN_TIMEOUT, default_log_filter, default_log_format, default_runtime_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PULSE")]
pub struct Config {
    /// Directory holding the pid, state, log and job files.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// `tracing` filter expression, for example `info` or `pulsed=debug`.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_owned())]
    pub log_filter: Option<String>,
    /// Log line format written by the daemon.
    pub log_format: Option<LogFormat>,
    /// Pause between two work-loop iterations, in milliseconds.
    pub heartbeat_interval_ms: Option<u64>,
    /// Pause between stopping and starting during `restart`, in milliseconds.
    pub restart_grace_ms: Option<u64>,
    /// How long `restart` waits for the old instance to exit, in milliseconds.
    pub shutdown_timeout_ms: Option<u64>,
}

impl Config {
    /// Runtime directory, falling back to [`default_runtime_dir`].
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.runtime_dir
            .as_ref()
            .map_or_else(default_runtime_dir, |dir| dir.as_std_path().to_path_buf())
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log line format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Sleep between work-loop iterations; bounds graceful-stop latency.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval_ms
            .map_or(DEFAULT_HEARTBEAT_INTERVAL, Duration::from_millis)
    }

    /// Pause inserted between `stop` and `start` when restarting.
    #[must_use]
    pub fn restart_grace(&self) -> Duration {
        self.restart_grace_ms
            .map_or(DEFAULT_RESTART_GRACE, Duration::from_millis)
    }

    /// Upper bound on how long `restart` waits for the previous instance.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout_ms
            .map_or(DEFAULT_SHUTDOWN_TIMEOUT, Duration::from_millis)
    }
}
