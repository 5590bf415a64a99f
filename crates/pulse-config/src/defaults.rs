use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default pause between two work-loop iterations.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Default pause between stopping and starting during a restart.
pub const DEFAULT_RESTART_GRACE: Duration = Duration::from_secs(1);

/// Default budget a restart waits for the previous instance to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Computes the default runtime directory holding the pid, state, log and
/// job files.
///
/// Prefers `$XDG_RUNTIME_DIR/pulse`; otherwise falls back to a per-user
/// directory under the system temporary directory.
pub fn default_runtime_dir() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push("pulse");
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push("pulse");
        dir.push(user_namespace());
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push("pulse");
        dir
    }
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}
