//! Structured telemetry initialisation.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use time::macros::format_description;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime, writer::BoxMakeWriter};

use pulse_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Destination for log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// The invoking terminal; used by controller commands and foreground runs.
    Stderr,
    /// Append-only log file; used once the instance detaches.
    File(PathBuf),
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
    /// Failed to open the log file.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: only the first invocation installs the
/// subscriber, later calls return a fresh [`TelemetryHandle`].
///
/// The log file is opened here, before any detachment, so the descriptor
/// survives the redirection of the standard streams.
pub fn initialise(config: &Config, sink: &LogSink) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config, sink))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config, sink: &LogSink) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let (writer, ansi) = match sink {
        LogSink::Stderr => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
        LogSink::File(path) => (BoxMakeWriter::new(Mutex::new(open_log(path)?)), false),
    };

    let builder = |filter: EnvFilter, writer: BoxMakeWriter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_timer(UtcTime::new(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            )))
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter, writer).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter, writer).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn open_log(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_file_is_created_in_append_mode() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("pulsed.log");
        std::fs::write(&path, b"earlier\n").expect("seed log");
        let mut file = open_log(&path).expect("open log");
        io::Write::write_all(&mut file, b"later\n").expect("append");
        let content = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(content, "earlier\nlater\n");
    }

    #[test]
    fn unopenable_log_file_is_reported() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("missing").join("pulsed.log");
        let error = open_log(&path).expect_err("parent directory is missing");
        assert!(matches!(error, TelemetryError::LogFile { .. }));
    }
}
