// Subreaper setup and survivor cleanup
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::{debug, info, warn};

use cascade_core::domain::ProcessId;

/// Attempts to collect a killed survivor's status before giving up
const REAP_ATTEMPTS: u32 = 50;
const REAP_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Make the calling process a child subreaper (Linux only)
///
/// Orphaned descendants are re-parented to us instead of init, so their exit
/// status can be collected and checked by this process.
#[cfg(target_os = "linux")]
pub fn become_subreaper() -> std::io::Result<()> {
    nix::sys::prctl::set_child_subreaper(true)?;
    info!("Registered as child subreaper");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn become_subreaper() -> std::io::Result<()> {
    Err(std::io::Error::from(Errno::ENOSYS))
}

/// SIGKILL every pid and reap the ones that are our children
///
/// Used after a failed verification so survivors do not outlive the test.
/// Returns the number of processes that were signalled.
pub async fn kill_and_reap(pids: &[ProcessId]) -> usize {
    let mut killed = 0;

    for &pid in pids {
        let raw = Pid::from_raw(pid.as_raw());
        match kill(raw, Signal::SIGKILL) {
            Ok(()) => killed += 1,
            Err(Errno::ESRCH) => {
                debug!(pid = %pid, "Survivor already gone");
                continue;
            }
            Err(errno) => {
                warn!(pid = %pid, error = %errno, "Failed to kill survivor");
                continue;
            }
        }

        for _ in 0..REAP_ATTEMPTS {
            match waitpid(raw, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => tokio::time::sleep(REAP_RETRY_DELAY).await,
                Ok(status) => {
                    debug!(pid = %pid, status = ?status, "Survivor reaped");
                    break;
                }
                // Not ours: its parent (or init) reaps it
                Err(Errno::ECHILD) => break,
                Err(errno) => {
                    warn!(pid = %pid, error = %errno, "Failed to reap survivor");
                    break;
                }
            }
        }
    }

    info!(requested = pids.len(), killed = killed, "Survivor cleanup done");
    killed
}
