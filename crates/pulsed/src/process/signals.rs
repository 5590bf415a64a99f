//! Signal routing for the detached instance.
//!
//! Delivery is asynchronous and may interrupt the process anywhere, so the
//! handler context only records that a signal arrived (signal-hook's pending
//! set and self-pipe). Everything else, mapping the signal to an action,
//! logging and running hooks, happens synchronously when the work loop calls
//! [`SignalRouter::dispatch`].

use std::io;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;

/// Signals the instance subscribes to. SIGUSR2 is caught but not routed, so
/// it is logged and ignored instead of terminating the process.
pub(crate) const SUBSCRIBED_SIGNALS: [c_int; 5] = [SIGTERM, SIGINT, SIGHUP, SIGUSR1, SIGUSR2];

/// Action requested by a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGTERM or SIGINT: stop gracefully.
    Terminate,
    /// SIGHUP: reload extension point.
    Reload,
    /// SIGUSR1: operator-defined extension point.
    Custom,
    /// Any other subscribed signal.
    Unrecognised(c_int),
}

impl SignalEvent {
    /// Maps a raw signal number to its routed action.
    #[must_use]
    pub fn from_raw(signal: c_int) -> Self {
        match signal {
            SIGTERM | SIGINT => Self::Terminate,
            SIGHUP => Self::Reload,
            SIGUSR1 => Self::Custom,
            other => Self::Unrecognised(other),
        }
    }
}

/// Errors reported while installing signal handlers.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Source of raw signal numbers delivered to the process.
pub trait SignalSource: Send {
    /// Starts capturing signals. Called once, after detachment.
    fn install(&mut self) -> Result<(), SignalError>;

    /// Drains the signals that arrived since the previous call without
    /// blocking.
    fn pending(&mut self) -> Vec<c_int>;
}

/// Signal source backed by `signal-hook`.
#[derive(Default)]
pub struct SystemSignals {
    signals: Option<Signals>,
}

impl SystemSignals {
    /// Builds an uninstalled source; nothing is captured until
    /// [`SignalSource::install`] runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalSource for SystemSignals {
    fn install(&mut self) -> Result<(), SignalError> {
        if self.signals.is_none() {
            let signals = Signals::new(SUBSCRIBED_SIGNALS)
                .map_err(|source| SignalError::Install { source })?;
            self.signals = Some(signals);
            info!(
                target: PROCESS_TARGET,
                signals = ?SUBSCRIBED_SIGNALS,
                "signal handlers installed"
            );
        }
        Ok(())
    }

    fn pending(&mut self) -> Vec<c_int> {
        self.signals
            .as_mut()
            .map(|signals| signals.pending().collect())
            .unwrap_or_default()
    }
}

/// Flags set by the router and cleared by the work loop once acted upon.
#[derive(Debug, Default)]
pub struct PendingSignals {
    stop: AtomicBool,
    reload: AtomicBool,
    custom: AtomicBool,
}

impl PendingSignals {
    /// Whether a graceful stop has been requested and not yet handled.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Consumes a pending graceful-stop request.
    pub fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::SeqCst)
    }

    /// Consumes a pending reload request.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Consumes a pending custom-action request.
    pub fn take_custom(&self) -> bool {
        self.custom.swap(false, Ordering::SeqCst)
    }

    fn record(&self, event: SignalEvent) {
        let flag = match event {
            SignalEvent::Terminate => &self.stop,
            SignalEvent::Reload => &self.reload,
            SignalEvent::Custom => &self.custom,
            SignalEvent::Unrecognised(_) => return,
        };
        flag.store(true, Ordering::SeqCst);
    }
}

/// Extension points invoked from the work loop for reload and custom
/// signals.
pub trait SignalHooks: Send {
    /// Runs after a reload signal has been observed.
    fn on_reload(&mut self);

    /// Runs after the user-defined signal has been observed.
    fn on_custom(&mut self);
}

/// Default hooks: acknowledge the signal in the log and do nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSignalHooks;

impl SignalHooks for LoggingSignalHooks {
    fn on_reload(&mut self) {
        info!(target: PROCESS_TARGET, "reload requested; no reload action configured");
    }

    fn on_custom(&mut self) {
        info!(target: PROCESS_TARGET, "custom action requested; no custom action configured");
    }
}

/// Translates raw signals from a [`SignalSource`] into [`PendingSignals`].
pub(crate) struct SignalRouter<S> {
    source: S,
    pending: PendingSignals,
}

impl<S: SignalSource> SignalRouter<S> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            pending: PendingSignals::default(),
        }
    }

    pub(crate) fn install(&mut self) -> Result<(), SignalError> {
        self.source.install()
    }

    /// Maps every signal that arrived since the last call onto the pending
    /// flags, logging each one.
    pub(crate) fn dispatch(&mut self) {
        for raw in self.source.pending() {
            let event = SignalEvent::from_raw(raw);
            match event {
                SignalEvent::Unrecognised(signal) => {
                    warn!(
                        target: PROCESS_TARGET,
                        signal,
                        "unrecognised signal ignored"
                    );
                }
                routed => {
                    info!(
                        target: PROCESS_TARGET,
                        signal = raw,
                        event = ?routed,
                        "signal received"
                    );
                }
            }
            self.pending.record(event);
        }
    }

    pub(crate) fn pending(&self) -> &PendingSignals {
        &self.pending
    }
}
