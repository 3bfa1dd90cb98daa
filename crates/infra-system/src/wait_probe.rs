// waitpid-based status probe
// reason: nix for WNOHANG waitpid and signal-0 liveness checks
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::path::PathBuf;
use tracing::debug;

use cascade_core::application::constants::DEFAULT_PROCFS_ROOT;
use cascade_core::domain::{Presence, ProcessId, TerminationOutcome};
use cascade_core::port::StatusProbe;

use crate::procfs_lister::parse_stat_state;

/// What a successful waitpid on a descendant means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapMode {
    /// The process was still present under us: verification failure
    Strict,
    /// We are the subreaper for the tree, so collecting an exited
    /// descendant's status is the orchestrator doing its own reaping
    AdoptOrphans,
}

/// Non-blocking status probe built on `waitpid(pid, WNOHANG)`
///
/// `ECHILD` only says the pid is not our child. Descendants normally are
/// not, so by default `ECHILD` is confirmed with `kill(pid, 0)`: `ESRCH`
/// means gone, anything else means the process (or its zombie) still exists.
pub struct WaitStatusProbe {
    mode: ReapMode,
    confirm_liveness: bool,
    procfs_root: PathBuf,
}

impl WaitStatusProbe {
    pub fn new(mode: ReapMode) -> Self {
        Self {
            mode,
            confirm_liveness: true,
            procfs_root: PathBuf::from(DEFAULT_PROCFS_ROOT),
        }
    }

    pub fn strict() -> Self {
        Self::new(ReapMode::Strict)
    }

    pub fn adopting() -> Self {
        Self::new(ReapMode::AdoptOrphans)
    }

    /// Treat `ECHILD` alone as "reaped" (no signal-0 confirmation)
    pub fn without_liveness_check(mut self) -> Self {
        self.confirm_liveness = false;
        self
    }

    fn liveness(&self, pid: ProcessId) -> TerminationOutcome {
        match kill(Pid::from_raw(pid.as_raw()), None) {
            Err(Errno::ESRCH) => TerminationOutcome::Reaped,
            // EPERM: exists, owned by someone else
            Ok(()) | Err(Errno::EPERM) => TerminationOutcome::StillAlive(self.presence(pid)),
            Err(errno) => TerminationOutcome::Error(format!("kill({}, 0): {}", pid, errno)),
        }
    }

    fn presence(&self, pid: ProcessId) -> Presence {
        let stat_path = self.procfs_root.join(pid.to_string()).join("stat");
        match std::fs::read_to_string(stat_path) {
            Ok(stat) if parse_stat_state(&stat) == Some('Z') => Presence::Zombie,
            _ => Presence::Running,
        }
    }
}

impl StatusProbe for WaitStatusProbe {
    fn query(&self, pid: ProcessId) -> TerminationOutcome {
        let outcome = match waitpid(Pid::from_raw(pid.as_raw()), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => TerminationOutcome::StillAlive(Presence::Running),
            Ok(status) => match self.mode {
                ReapMode::Strict => TerminationOutcome::StillAlive(Presence::WaitedChild),
                ReapMode::AdoptOrphans => {
                    debug!(pid = %pid, status = ?status, "Reaped adopted descendant");
                    TerminationOutcome::Reaped
                }
            },
            Err(Errno::ECHILD) if self.confirm_liveness => self.liveness(pid),
            Err(Errno::ECHILD) => TerminationOutcome::Reaped,
            Err(errno) => TerminationOutcome::Error(format!("waitpid({}): {}", pid, errno)),
        };

        debug!(pid = %pid, outcome = %outcome, "Status query");
        outcome
    }
}
