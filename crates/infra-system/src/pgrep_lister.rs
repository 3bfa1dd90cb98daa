// pgrep-based process lister
// reason: tokio::process so the listing query never blocks the runtime
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use cascade_core::application::constants::{DEFAULT_PGREP_PROGRAM, PGREP_NO_MATCH_EXIT_CODE};
use cascade_core::domain::ProcessId;
use cascade_core::port::{ListingError, ProcessLister};

use crate::listing::parse_pids;

/// Lists direct children by running `pgrep -P <pid>`
///
/// Exit status contract (procps-ng, BSD and macOS agree):
/// - 0: one pid per stdout line
/// - 1: no process matched, i.e. no children
/// - anything else: the query itself failed
pub struct PgrepLister {
    program: String,
}

impl PgrepLister {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PGREP_PROGRAM)
    }

    /// Use a different pgrep-compatible binary (invoked as `<program> -P <pid>`)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PgrepLister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLister for PgrepLister {
    async fn direct_children(&self, parent: ProcessId) -> Result<Vec<ProcessId>, ListingError> {
        let output = Command::new(&self.program)
            .arg("-P")
            .arg(parent.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ListingError::Spawn {
                parent,
                reason: format!("{}: {}", self.program, e),
            })?;

        match output.status.code() {
            Some(0) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let children = parse_pids(parent, stdout.lines())?;
                debug!(parent = %parent, children = ?children, "pgrep listed children");
                Ok(children)
            }
            Some(PGREP_NO_MATCH_EXIT_CODE) => {
                debug!(parent = %parent, "pgrep found no children");
                Ok(Vec::new())
            }
            _ => Err(ListingError::QueryFailed {
                parent,
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }
}
