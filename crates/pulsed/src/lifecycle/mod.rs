//! Lifecycle commands issued from the terminal.
//!
//! - [`types`] defines the command model, outcomes and output helpers.
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`controller`] implements the start/stop/status/restart flows.

mod controller;
mod error;
mod types;

pub use controller::{Launcher, Lifecycle, LifecycleTimings, SystemLauncher, SystemLifecycle};
pub use error::LifecycleError;
pub use types::{LifecycleCommand, LifecycleOutput, StartOutcome, StatusReport, StopOutcome};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");
