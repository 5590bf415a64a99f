//! The pid registry: a single well-known file naming the running instance.
//!
//! The file is the only source of truth for "is an instance running". Only
//! the instance itself writes or removes it; controller processes read it and
//! probe or signal the recorded pid.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, info};

use super::PROCESS_TARGET;
use super::errors::LaunchError;

/// Classification of the registry contents against the live process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No pid file, or its content does not parse as a pid.
    Absent,
    /// The recorded process exists.
    Live(u32),
    /// The recorded process no longer exists.
    Stale(u32),
}

/// Probes and signals processes named by the registry.
pub trait ProcessSignaller {
    /// Returns whether a process with this pid currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Asks the process to stop gracefully.
    fn terminate(&self, pid: u32) -> Result<(), Errno>;
}

/// Signaller backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignaller;

impl ProcessSignaller for SystemSignaller {
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        // The null signal performs the permission and existence checks only.
        match kill(Pid::from_raw(raw), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate(&self, pid: u32) -> Result<(), Errno> {
        let raw = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
        if raw <= 0 {
            return Err(Errno::ESRCH);
        }
        kill(Pid::from_raw(raw), Signal::SIGTERM)
    }
}

/// Reads and writes the pid file.
#[derive(Debug, Clone)]
pub struct PidRegistry {
    path: PathBuf,
}

impl PidRegistry {
    /// Builds a registry backed by the given pid file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the pid file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Records `pid` as the running instance, replacing any previous record.
    pub fn register(&self, pid: u32) -> Result<(), LaunchError> {
        let write_error = |source| LaunchError::PidWrite {
            path: self.path.clone(),
            source,
        };
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options.open(&self.path).map_err(write_error)?;
        writeln!(file, "{pid}").map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %self.path.display(),
            "pid file written"
        );
        Ok(())
    }

    /// Returns the recorded pid, if any.
    ///
    /// Missing files and unparsable or zero content all read as "no record".
    pub fn read(&self) -> Option<u32> {
        let content = fs::read_to_string(&self.path).ok()?;
        let pid = content.trim().parse::<u32>().ok().filter(|pid| *pid != 0);
        if pid.is_none() {
            debug!(
                target: PROCESS_TARGET,
                file = %self.path.display(),
                "pid file present but unparsable; treating as absent"
            );
        }
        pid
    }

    /// Removes the record. A file that is already gone is not an error.
    pub fn clear(&self) -> Result<(), LaunchError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    "pid file removed"
                );
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LaunchError::Cleanup {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Reads the record and probes the recorded pid.
    pub fn inspect(&self, signaller: &dyn ProcessSignaller) -> RegistryState {
        match self.read() {
            None => RegistryState::Absent,
            Some(pid) if signaller.is_alive(pid) => RegistryState::Live(pid),
            Some(pid) => RegistryState::Stale(pid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::process::Command;
    use tempfile::TempDir;

    struct RegistryFixture {
        _dir: TempDir,
        registry: PidRegistry,
    }

    #[fixture]
    fn fixture() -> RegistryFixture {
        let dir = TempDir::new().expect("create temp dir");
        let registry = PidRegistry::new(dir.path().join("pulsed.pid"));
        RegistryFixture {
            _dir: dir,
            registry,
        }
    }

    fn exited_pid() -> u32 {
        let mut child = Command::new("true").spawn().expect("spawn 'true'");
        let pid = child.id();
        child.wait().expect("reap child");
        pid
    }

    #[rstest]
    fn register_then_read_round_trips(fixture: RegistryFixture) {
        fixture.registry.register(4242).expect("register pid");
        assert_eq!(fixture.registry.read(), Some(4242));
    }

    #[rstest]
    fn register_overwrites_previous_record(fixture: RegistryFixture) {
        fixture.registry.register(999_999).expect("register first pid");
        fixture.registry.register(17).expect("register second pid");
        assert_eq!(fixture.registry.read(), Some(17));
    }

    #[rstest]
    #[case(b"  123\n\n".as_slice(), Some(123))]
    #[case(b"not-a-pid".as_slice(), None)]
    #[case(b"".as_slice(), None)]
    #[case(b"0\n".as_slice(), None)]
    #[case(b"-5".as_slice(), None)]
    fn read_tolerates_arbitrary_content(
        fixture: RegistryFixture,
        #[case] content: &[u8],
        #[case] expected: Option<u32>,
    ) {
        fs::write(fixture.registry.path(), content).expect("seed pid file");
        assert_eq!(fixture.registry.read(), expected);
    }

    #[rstest]
    fn read_reports_missing_file_as_absent(fixture: RegistryFixture) {
        assert_eq!(fixture.registry.read(), None);
    }

    #[rstest]
    fn clear_removes_record_and_is_idempotent(fixture: RegistryFixture) {
        fixture.registry.register(55).expect("register pid");
        fixture.registry.clear().expect("first clear");
        assert!(!fixture.registry.path().exists());
        fixture.registry.clear().expect("second clear is a no-op");
    }

    #[rstest]
    fn inspect_classifies_records(fixture: RegistryFixture) {
        assert_eq!(
            fixture.registry.inspect(&SystemSignaller),
            RegistryState::Absent
        );

        fixture
            .registry
            .register(std::process::id())
            .expect("register own pid");
        assert_eq!(
            fixture.registry.inspect(&SystemSignaller),
            RegistryState::Live(std::process::id())
        );

        let dead = exited_pid();
        fixture.registry.register(dead).expect("register dead pid");
        assert_eq!(
            fixture.registry.inspect(&SystemSignaller),
            RegistryState::Stale(dead)
        );
    }

    #[test]
    fn system_signaller_rejects_out_of_range_pids() {
        assert!(!SystemSignaller.is_alive(0));
        assert!(!SystemSignaller.is_alive(u32::MAX));
        assert_eq!(SystemSignaller.terminate(u32::MAX), Err(Errno::ESRCH));
    }

    #[test]
    fn terminating_an_exited_process_fails() {
        let dead = exited_pid();
        assert_eq!(SystemSignaller.terminate(dead), Err(Errno::ESRCH));
    }
}
