// Cascade Infrastructure - System Adapters
// Implements: ProcessLister, ProcessLauncher/RootProcess, StatusProbe

mod listing;
pub mod pgrep_lister;
pub mod procfs_lister;

#[cfg(unix)]
pub mod reaper;
#[cfg(unix)]
mod signals;
#[cfg(unix)]
pub mod tokio_launcher;
#[cfg(unix)]
pub mod wait_probe;

pub use pgrep_lister::PgrepLister;
pub use procfs_lister::ProcfsLister;

#[cfg(unix)]
pub use reaper::{become_subreaper, kill_and_reap};
#[cfg(unix)]
pub use tokio_launcher::{TokioProcessLauncher, TokioRootProcess};
#[cfg(unix)]
pub use wait_probe::{ReapMode, WaitStatusProbe};
