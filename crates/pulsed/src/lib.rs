//! Single-instance background daemon with a pid-file lifecycle.
//!
//! `pulsed start` detaches from the terminal, records its pid and runs a
//! periodic work loop until a termination signal arrives. `stop`, `status`
//! and `restart` are issued from other processes and interact with the
//! running instance only through the pid file and signals.
//!
//! The runtime is exposed as [`run`] so the binary and the tests drive the
//! same entry point with substitutable IO streams.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use pulse_config::{Config, RuntimePaths, RuntimePathsError};
use thiserror::Error;

mod cli;
mod config;
pub mod health;
pub mod lifecycle;
pub mod process;
pub mod telemetry;

#[cfg(test)]
mod tests;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub use health::{HealthReporter, StructuredHealthReporter};
use lifecycle::{LifecycleCommand, LifecycleError, LifecycleOutput, SystemLifecycle};
use process::LaunchMode;
use telemetry::{LogSink, TelemetryError};

/// Errors surfaced at the command-line boundary.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error(transparent)]
    Paths(#[from] RuntimePathsError),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Runs the command-line runtime with the provided arguments and streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            let written = if error.use_stderr() {
                write!(stderr, "{rendered}")
            } else {
                write!(stdout, "{rendered}")
            };
            if written.is_err() {
                return ExitCode::FAILURE;
            }
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(2));
        }
    };
    let Some(command) = cli.command else {
        let help = Cli::command().render_help();
        return match write!(stdout, "{help}") {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| execute(command.into(), &config, &mut *stdout, &mut *stderr));
    match result {
        Ok(exit_code) => exit_code,
        Err(error) => {
            tracing::error!(target: "pulsed::lifecycle", error = %error, "command failed");
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write, E: Write>(
    command: LifecycleCommand,
    config: &Config,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError> {
    telemetry::initialise(config, &log_sink(command, config)?)?;
    let mut lifecycle = SystemLifecycle::system(config);
    let mut output = LifecycleOutput::new(stdout, stderr);
    Ok(lifecycle.handle(command, &mut output)?)
}

/// Detached instances log to the runtime log file; everything else logs to
/// the terminal.
fn log_sink(command: LifecycleCommand, config: &Config) -> Result<LogSink, AppError> {
    let foreground = match command {
        LifecycleCommand::Start { foreground } | LifecycleCommand::Restart { foreground } => {
            foreground
        }
        LifecycleCommand::Stop | LifecycleCommand::Status => return Ok(LogSink::Stderr),
    };
    match LaunchMode::detect(foreground) {
        LaunchMode::Foreground => Ok(LogSink::Stderr),
        LaunchMode::Background => {
            let paths = RuntimePaths::from_config(config)?;
            Ok(LogSink::File(paths.log_path().to_path_buf()))
        }
    }
}
