//! Command-line surface for `pulsed`.

use clap::{Parser, Subcommand};

use crate::lifecycle::LifecycleCommand;

/// Single-instance background daemon with a pid-file lifecycle.
///
/// Configuration flags (`--runtime-dir`, `--log-filter` and friends) must
/// precede the subcommand.
#[derive(Parser, Debug)]
#[command(name = "pulsed", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Detaches and runs the work loop until stopped.
    Start {
        /// Stay attached to the terminal instead of daemonising.
        #[arg(long)]
        foreground: bool,
    },
    /// Asks the running instance to stop gracefully.
    Stop,
    /// Stops the running instance, waits for it to exit, then starts anew.
    Restart {
        /// Stay attached to the terminal instead of daemonising.
        #[arg(long)]
        foreground: bool,
    },
    /// Reports whether an instance is running.
    Status,
}

impl From<CliCommand> for LifecycleCommand {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Start { foreground } => Self::Start { foreground },
            CliCommand::Stop => Self::Stop,
            CliCommand::Restart { foreground } => Self::Restart { foreground },
            CliCommand::Status => Self::Status,
        }
    }
}
