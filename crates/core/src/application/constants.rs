// Verification constants (No magic values)
use std::time::Duration;

/// How long descendants get to disappear after the root has exited (5s)
/// Cascading death signals and init reaping are asynchronous.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between two status sweeps over unsettled descendants (50ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound for a root to announce readiness on stdout (10s)
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default process-listing utility
pub const DEFAULT_PGREP_PROGRAM: &str = "pgrep";

/// pgrep exit status meaning "no processes matched" (procps-ng, BSD, macOS)
pub const PGREP_NO_MATCH_EXIT_CODE: i32 = 1;

/// Default procfs mount point
pub const DEFAULT_PROCFS_ROOT: &str = "/proc";
