// Process Launcher Port
// Abstraction for starting, signalling and reaping the root process under test

use crate::domain::{ProcessId, RootExit, TerminationSignal};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::application::constants::DEFAULT_READY_TIMEOUT;

/// When the launched root counts as "fully started"
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadinessGate {
    /// Enumerate as soon as the process is spawned
    #[default]
    Immediate,
    /// Give the root a fixed head start to build its tree
    Delay(Duration),
    /// Wait until the root prints this exact line on stdout
    StdoutLine(String),
}

/// Command line of the root process under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub readiness: ReadinessGate,
    /// Upper bound for `ReadinessGate::StdoutLine`
    pub ready_timeout: Duration,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            readiness: ReadinessGate::Immediate,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn readiness(mut self, readiness: ReadinessGate) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl std::fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Launcher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Spawn failed for {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Process {pid} never became ready: {reason}")]
    Readiness { pid: ProcessId, reason: String },

    #[error("Signal delivery to {pid} failed: {reason}")]
    Signal { pid: ProcessId, reason: String },

    #[error("Waiting for {pid} failed: {reason}")]
    Wait { pid: ProcessId, reason: String },
}

/// Handle to a live root process
///
/// Owned by the verifier for the whole cycle; dropping it must not leave
/// the root running.
#[async_trait]
pub trait RootProcess: Send {
    /// Process ID (valid while the process is live)
    fn id(&self) -> ProcessId;

    /// Deliver a termination signal
    ///
    /// # Errors
    /// - LaunchError::Signal if the signal could not be delivered
    fn signal(&mut self, signal: TerminationSignal) -> Result<(), LaunchError>;

    /// Block until the root has exited and been reaped
    ///
    /// # Errors
    /// - LaunchError::Wait if the exit status could not be collected
    async fn wait(&mut self) -> Result<RootExit, LaunchError>;
}

/// Process Launcher trait
///
/// Implementations:
/// - TokioProcessLauncher: spawns via tokio::process
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the root and pass its readiness gate
    ///
    /// # Errors
    /// - LaunchError::Spawn if the process cannot be started
    /// - LaunchError::Readiness if the readiness gate is not passed in time
    async fn launch(&self, command: &LaunchCommand) -> Result<Box<dyn RootProcess>, LaunchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Everything the verifier did to a mock root
    #[derive(Debug, Default, Clone)]
    pub struct RootJournal {
        pub signals: Vec<TerminationSignal>,
        pub waits: usize,
    }
    /// Mock root process recording signals and waits
    pub struct MockRootProcess {
        pid: ProcessId,
        fail_signal: bool,
        journal: Arc<Mutex<RootJournal>>,
    }
    impl MockRootProcess {
        pub fn new(pid: i32) -> Self {
            Self {
                pid: ProcessId::new(pid).expect("mock pid must be positive"),
                fail_signal: false,
                journal: Arc::new(Mutex::new(RootJournal::default())),
            }
        }
        /// Make the first signal delivery fail (later ones succeed)
        pub fn failing_signal(mut self) -> Self {
            self.fail_signal = true;
            self
        }
        /// Shared journal, readable after the handle was moved into the verifier
        pub fn journal(&self) -> Arc<Mutex<RootJournal>> {
            self.journal.clone()
        }
    }
    #[async_trait]
    impl RootProcess for MockRootProcess {
        fn id(&self) -> ProcessId {
            self.pid
        }
        fn signal(&mut self, signal: TerminationSignal) -> Result<(), LaunchError> {
            if self.fail_signal {
                self.fail_signal = false;
                return Err(LaunchError::Signal {
                    pid: self.pid,
                    reason: "EPERM".to_string(),
                });
            }
            self.journal.lock().unwrap().signals.push(signal);
            Ok(())
        }
        async fn wait(&mut self) -> Result<RootExit, LaunchError> {
            self.journal.lock().unwrap().waits += 1;
            Ok(RootExit {
                code: None,
                signal: Some(9),
            })
        }
    }
    /// Mock launcher handing out one prepared root
    pub struct MockProcessLauncher {
        root: Mutex<Option<MockRootProcess>>,
    }
    impl MockProcessLauncher {
        pub fn new(root: MockRootProcess) -> Self {
            Self {
                root: Mutex::new(Some(root)),
            }
        }
        /// Launcher whose spawn always fails
        pub fn failing() -> Self {
            Self {
                root: Mutex::new(None),
            }
        }
    }
    #[async_trait]
    impl ProcessLauncher for MockProcessLauncher {
        async fn launch(
            &self,
            command: &LaunchCommand,
        ) -> Result<Box<dyn RootProcess>, LaunchError> {
            match self.root.lock().unwrap().take() {
                Some(root) => Ok(Box::new(root)),
                None => Err(LaunchError::Spawn {
                    program: command.program.clone(),
                    reason: "No such file or directory".to_string(),
                }),
            }
        }
    }
}
