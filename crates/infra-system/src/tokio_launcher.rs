// Root process launcher
// reason: tokio::process for async wait + kill_on_drop, nix for arbitrary signals
use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info};

use cascade_core::domain::{ProcessId, RootExit, TerminationSignal};
use cascade_core::port::{LaunchCommand, LaunchError, ProcessLauncher, ReadinessGate, RootProcess};

use crate::signals::to_nix_signal;

/// Spawns the root process under test with tokio
///
/// stdin is closed and stderr inherited. stdout is inherited too, unless the
/// readiness gate needs to read it.
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(&self, command: &LaunchCommand) -> Result<Box<dyn RootProcess>, LaunchError> {
        let reads_stdout = matches!(command.readiness, ReadinessGate::StdoutLine(_));

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(if reads_stdout {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program: command.program.clone(),
                reason: e.to_string(),
            })?;

        let mut root = TokioRootProcess::from_child(child).map_err(|reason| LaunchError::Spawn {
            program: command.program.clone(),
            reason,
        })?;
        info!(pid = %root.pid, command = %command, "Root process spawned");

        match &command.readiness {
            ReadinessGate::Immediate => {}
            ReadinessGate::Delay(delay) => {
                debug!(pid = %root.pid, delay_ms = delay.as_millis() as u64, "Waiting for root to settle");
                tokio::time::sleep(*delay).await;
            }
            ReadinessGate::StdoutLine(marker) => {
                root.await_ready_line(marker, command.ready_timeout).await?;
            }
        }

        Ok(Box::new(root))
    }
}

/// Live root process backed by a tokio child
///
/// Dropping the handle kills the process (kill_on_drop).
pub struct TokioRootProcess {
    pid: ProcessId,
    child: Child,
}

impl TokioRootProcess {
    /// Wrap an already spawned child
    pub fn from_child(child: Child) -> Result<Self, String> {
        let pid = child
            .id()
            .ok_or_else(|| "process exited before its pid could be read".to_string())
            .and_then(|id| ProcessId::from_u32(id).map_err(|e| e.to_string()))?;
        Ok(Self { pid, child })
    }

    /// Read stdout until `marker` shows up, then keep draining it into the log
    async fn await_ready_line(
        &mut self,
        marker: &str,
        ready_timeout: std::time::Duration,
    ) -> Result<(), LaunchError> {
        let pid = self.pid;
        let stdout = self.child.stdout.take().ok_or_else(|| LaunchError::Readiness {
            pid,
            reason: "stdout is not piped".to_string(),
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let wait_for_marker = async {
            while let Some(line) = lines.next_line().await? {
                if line.trim_end() == marker {
                    return Ok(true);
                }
                debug!(pid = %pid, line = %line, "Root stdout before readiness");
            }
            Ok::<bool, std::io::Error>(false)
        };
        let ready = timeout(ready_timeout, wait_for_marker).await;

        match ready {
            Ok(Ok(true)) => {
                info!(pid = %pid, marker = %marker, "Root process ready");
                tokio::spawn(drain_stdout(pid, lines));
                Ok(())
            }
            Ok(Ok(false)) => Err(LaunchError::Readiness {
                pid,
                reason: format!("stdout closed before {:?} was printed", marker),
            }),
            Ok(Err(e)) => Err(LaunchError::Readiness {
                pid,
                reason: e.to_string(),
            }),
            Err(_) => Err(LaunchError::Readiness {
                pid,
                reason: format!("no {:?} line within {}ms", marker, ready_timeout.as_millis()),
            }),
        }
    }
}

/// Keep the pipe open and readable so the root never blocks on a full pipe
async fn drain_stdout(pid: ProcessId, mut lines: Lines<BufReader<ChildStdout>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid = %pid, line = %line, "Root stdout");
    }
}

#[async_trait]
impl RootProcess for TokioRootProcess {
    fn id(&self) -> ProcessId {
        self.pid
    }

    fn signal(&mut self, signal: TerminationSignal) -> Result<(), LaunchError> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        debug!(pid = %self.pid, signal = %signal, "Delivering signal to root");
        kill(Pid::from_raw(self.pid.as_raw()), to_nix_signal(signal)).map_err(|e| {
            LaunchError::Signal {
                pid: self.pid,
                reason: e.to_string(),
            }
        })
    }

    async fn wait(&mut self) -> Result<RootExit, LaunchError> {
        let status = self.child.wait().await.map_err(|e| LaunchError::Wait {
            pid: self.pid,
            reason: e.to_string(),
        })?;

        Ok(RootExit {
            code: status.code(),
            signal: status.signal(),
        })
    }
}
