// Termination verification
use crate::application::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_TIMEOUT};
use crate::application::enumerator::DescendantEnumerator;
use crate::domain::{
    DescendantOutcome, DescendantSet, DomainError, RootExit, TerminationSignal, VerificationReport,
};
use crate::error::Result;
use crate::port::{
    IdProvider, LaunchCommand, ProcessLauncher, ProcessLister, RootProcess, StatusProbe,
    TimeProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Verifier configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Signal sent to the root in the Terminate phase
    pub signal: TerminationSignal,
    /// Bounded time for descendants to disappear after the root exited
    pub settle_timeout: Duration,
    /// Pause between status sweeps while waiting
    pub poll_interval: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            signal: TerminationSignal::Kill,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> std::result::Result<(), DomainError> {
        if self.poll_interval.is_zero() {
            return Err(DomainError::ValidationError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Termination verifier
///
/// Runs one linear cycle: Start -> Enumerate -> Terminate -> Verify -> Done.
/// Enumeration happens exactly once, before the root is signalled, and its
/// snapshot is the baseline that must be empty afterwards.
pub struct TerminationVerifier {
    launcher: Arc<dyn ProcessLauncher>,
    enumerator: DescendantEnumerator,
    probe: Arc<dyn StatusProbe>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    config: VerifierConfig,
}

impl TerminationVerifier {
    /// Create a new verifier
    ///
    /// # Example
    /// ```ignore
    /// let verifier = TerminationVerifier::new(
    ///     Arc::new(TokioProcessLauncher::new()),
    ///     Arc::new(ProcfsLister::new()),
    ///     Arc::new(WaitStatusProbe::strict()),
    ///     Arc::new(SystemTimeProvider),
    ///     Arc::new(UuidProvider),
    ///     VerifierConfig::default(),
    /// );
    /// let report = verifier.run(&LaunchCommand::new("runsc").args(["do", "sleep", "10000"])).await?;
    /// ```
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        lister: Arc<dyn ProcessLister>,
        probe: Arc<dyn StatusProbe>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            launcher,
            enumerator: DescendantEnumerator::new(lister),
            probe,
            time_provider,
            id_provider,
            config,
        }
    }

    /// Full cycle: spawn the root described by `command`, then `verify` it
    ///
    /// # Errors
    /// - VerifyError::Spawn if the root cannot be started
    /// - VerifyError::Readiness if the root never passes its readiness gate
    /// - everything `verify` returns
    pub async fn run(&self, command: &LaunchCommand) -> Result<VerificationReport> {
        self.config.validate()?;

        info!(command = %command, "Starting root process");
        let root = self.launcher.launch(command).await?;

        self.verify(root).await
    }

    /// Verify an already-running root: enumerate, terminate, check descendants
    ///
    /// On a fatal error the root is killed and reaped before returning.
    ///
    /// # Errors
    /// - VerifyError::Config if the configuration is invalid
    /// - VerifyError::MalformedListing / ListingFailed / Spawn from enumeration
    /// - VerifyError::TerminationDelivery if the root cannot be signalled
    /// - VerifyError::RootWait if the root's exit cannot be observed
    pub async fn verify(&self, mut root: Box<dyn RootProcess>) -> Result<VerificationReport> {
        if let Err(e) = self.config.validate() {
            self.teardown(root.as_mut()).await;
            return Err(e.into());
        }

        let run_id = self.id_provider.generate_id();
        let started_at = self.time_provider.now_millis();
        let root_pid = root.id();

        info!(run_id = %run_id, root = %root_pid, "Verification started");

        let (descendants, root_exit) = match self.enumerate_and_terminate(root.as_mut()).await {
            Ok(result) => result,
            Err(e) => {
                error!(run_id = %run_id, root = %root_pid, error = %e, "Verification aborted");
                self.teardown(root.as_mut()).await;
                return Err(e);
            }
        };

        let outcomes = self.settle(&descendants).await;

        let report = VerificationReport {
            run_id,
            root: root_pid,
            signal: self.config.signal,
            root_exit,
            descendants,
            outcomes,
            started_at,
            finished_at: self.time_provider.now_millis(),
        };

        for failure in report.failures() {
            warn!(run_id = %report.run_id, pid = %failure.pid, "{}", failure);
        }
        info!(
            run_id = %report.run_id,
            root = %report.root,
            descendants = report.descendants.len(),
            failures = report.failures().len(),
            passed = report.passed(),
            duration_ms = report.duration_ms(),
            "Verification finished"
        );

        Ok(report)
    }

    /// Enumerate and Terminate phases (both fatal on error)
    async fn enumerate_and_terminate(
        &self,
        root: &mut dyn RootProcess,
    ) -> Result<(DescendantSet, RootExit)> {
        let root_pid = root.id();

        let descendants = self.enumerator.descendants(root_pid).await?;
        info!(
            root = %root_pid,
            descendants = ?descendants.as_slice(),
            "Found descendants"
        );

        root.signal(self.config.signal)?;
        info!(root = %root_pid, signal = %self.config.signal, "Root process signalled");

        // Block on the root's own exit before judging its descendants
        let root_exit = root.wait().await?;
        info!(root = %root_pid, exit = %root_exit, "Root process exited");

        Ok((descendants, root_exit))
    }

    /// Verify phase: poll every descendant until all outcomes are settled or
    /// the settle timeout runs out. Never blocks on a single process.
    async fn settle(&self, descendants: &DescendantSet) -> Vec<DescendantOutcome> {
        let deadline = Instant::now() + self.config.settle_timeout;

        let mut outcomes: Vec<DescendantOutcome> = descendants
            .iter()
            .map(|pid| DescendantOutcome {
                pid,
                outcome: self.probe.query(pid),
            })
            .collect();

        loop {
            let pending = outcomes.iter().filter(|o| !o.outcome.is_settled()).count();
            if pending == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    pending = pending,
                    settle_timeout_ms = self.config.settle_timeout.as_millis() as u64,
                    "Settle timeout reached with descendants still present"
                );
                break;
            }

            debug!(pending = pending, "Waiting for descendants to settle");
            tokio::time::sleep(self.config.poll_interval).await;

            for entry in outcomes.iter_mut().filter(|o| !o.outcome.is_settled()) {
                entry.outcome = self.probe.query(entry.pid);
                debug!(pid = %entry.pid, outcome = %entry.outcome, "Probed descendant");
            }
        }

        outcomes
    }

    /// Best-effort: make sure an aborted run does not leak the root
    async fn teardown(&self, root: &mut dyn RootProcess) {
        let pid = root.id();
        if let Err(e) = root.signal(TerminationSignal::Kill) {
            warn!(root = %pid, error = %e, "Teardown: failed to kill root");
        }
        match root.wait().await {
            Ok(exit) => debug!(root = %pid, exit = %exit, "Teardown: root reaped"),
            Err(e) => warn!(root = %pid, error = %e, "Teardown: failed to reap root"),
        }
    }
}
