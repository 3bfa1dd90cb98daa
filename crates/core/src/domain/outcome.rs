// Termination Outcome & Verification Report

use serde::{Deserialize, Serialize};

use super::process::{DescendantSet, ProcessId};

/// How a descendant that has not gone away was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Presence {
    /// Process is running (or sleeping/stopped)
    Running,
    /// Process has exited but nobody has consumed its exit status yet
    Zombie,
    /// The status query itself found the process as our own child and
    /// consumed its status: it was still present when checked
    WaitedChild,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presence::Running => write!(f, "RUNNING"),
            Presence::Zombie => write!(f, "ZOMBIE"),
            Presence::WaitedChild => write!(f, "WAITED_CHILD"),
        }
    }
}

/// Result of one non-blocking status query for a descendant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationOutcome {
    /// No living or zombie presence remains
    Reaped,
    StillAlive(Presence),
    /// Unexpected OS error from the query
    Error(String),
}

impl TerminationOutcome {
    pub fn is_reaped(&self) -> bool {
        matches!(self, TerminationOutcome::Reaped)
    }

    /// False while the outcome may still change as cascading cleanup runs.
    ///
    /// A running or zombie process can still exit or be reaped by its new
    /// parent; everything else is final for this verification pass.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            TerminationOutcome::StillAlive(Presence::Running | Presence::Zombie)
        )
    }
}

impl std::fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationOutcome::Reaped => write!(f, "REAPED"),
            TerminationOutcome::StillAlive(presence) => write!(f, "STILL_ALIVE ({})", presence),
            TerminationOutcome::Error(msg) => write!(f, "ERROR ({})", msg),
        }
    }
}

/// Signal used to terminate the root process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationSignal {
    /// SIGKILL (forceful, cannot be caught)
    #[default]
    Kill,
    /// SIGTERM
    Terminate,
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Kill => write!(f, "SIGKILL"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

impl std::str::FromStr for TerminationSignal {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KILL" | "SIGKILL" | "9" => Ok(TerminationSignal::Kill),
            "TERM" | "SIGTERM" | "15" => Ok(TerminationSignal::Terminate),
            other => Err(super::DomainError::ValidationError(format!(
                "unsupported termination signal: {}",
                other
            ))),
        }
    }
}

/// How the root process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RootExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl std::fmt::Display for RootExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => write!(f, "unknown"),
        }
    }
}

/// Final outcome recorded for one descendant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescendantOutcome {
    pub pid: ProcessId,
    pub outcome: TerminationOutcome,
}

/// Why a descendant failed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    DescendantSurvived(Presence),
    UnexpectedQueryError(String),
}

/// One failed descendant, named individually for diagnosis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub pid: ProcessId,
    pub kind: FailureKind,
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FailureKind::DescendantSurvived(presence) => {
                write!(f, "descendant {} survived root termination ({})", self.pid, presence)
            }
            FailureKind::UnexpectedQueryError(msg) => {
                write!(f, "unexpected error querying descendant {}: {}", self.pid, msg)
            }
        }
    }
}

/// Result of one full verification cycle
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub run_id: String,
    pub root: ProcessId,
    pub signal: TerminationSignal,
    pub root_exit: RootExit,
    pub descendants: DescendantSet,
    pub outcomes: Vec<DescendantOutcome>,
    pub started_at: i64,
    pub finished_at: i64,
}

impl VerificationReport {
    /// Passes only if every enumerated descendant was reaped
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome.is_reaped())
    }

    /// Every failed descendant, in discovery order
    pub fn failures(&self) -> Vec<VerificationFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                let kind = match &o.outcome {
                    TerminationOutcome::Reaped => return None,
                    TerminationOutcome::StillAlive(presence) => {
                        FailureKind::DescendantSurvived(*presence)
                    }
                    TerminationOutcome::Error(msg) => FailureKind::UnexpectedQueryError(msg.clone()),
                };
                Some(VerificationFailure { pid: o.pid, kind })
            })
            .collect()
    }

    /// Descendants still running or lingering as zombies
    pub fn survivors(&self) -> Vec<ProcessId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, TerminationOutcome::StillAlive(_)))
            .map(|o| o.pid)
            .collect()
    }

    pub fn duration_ms(&self) -> i64 {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    fn report(outcomes: Vec<(i32, TerminationOutcome)>) -> VerificationReport {
        let outcomes: Vec<DescendantOutcome> = outcomes
            .into_iter()
            .map(|(n, outcome)| DescendantOutcome { pid: pid(n), outcome })
            .collect();
        VerificationReport {
            run_id: "run-1".to_string(),
            root: pid(1),
            signal: TerminationSignal::Kill,
            root_exit: RootExit {
                code: None,
                signal: Some(9),
            },
            descendants: DescendantSet::from_discovered(outcomes.iter().map(|o| o.pid).collect()),
            outcomes,
            started_at: 1000,
            finished_at: 1250,
        }
    }

    #[test]
    fn test_settled_outcomes() {
        assert!(TerminationOutcome::Reaped.is_settled());
        assert!(TerminationOutcome::Error("EPERM".into()).is_settled());
        assert!(TerminationOutcome::StillAlive(Presence::WaitedChild).is_settled());
        assert!(!TerminationOutcome::StillAlive(Presence::Running).is_settled());
        assert!(!TerminationOutcome::StillAlive(Presence::Zombie).is_settled());
    }

    #[test]
    fn test_empty_report_passes() {
        let report = report(vec![]);
        assert!(report.passed());
        assert!(report.failures().is_empty());
        assert_eq!(report.duration_ms(), 250);
    }

    #[test]
    fn test_failures_are_reported_individually() {
        let report = report(vec![
            (10, TerminationOutcome::Reaped),
            (11, TerminationOutcome::StillAlive(Presence::Running)),
            (12, TerminationOutcome::Error("EINVAL".into())),
            (13, TerminationOutcome::StillAlive(Presence::Zombie)),
        ]);

        assert!(!report.passed());
        let failures = report.failures();
        assert_eq!(failures.len(), 3);
        assert_eq!(
            failures[0],
            VerificationFailure {
                pid: pid(11),
                kind: FailureKind::DescendantSurvived(Presence::Running),
            }
        );
        assert_eq!(
            failures[1].kind,
            FailureKind::UnexpectedQueryError("EINVAL".into())
        );
        assert_eq!(report.survivors(), vec![pid(11), pid(13)]);
        assert!(failures[0].to_string().contains("11"));
    }

    #[test]
    fn test_signal_parsing() {
        assert_eq!("kill".parse::<TerminationSignal>().unwrap(), TerminationSignal::Kill);
        assert_eq!("SIGTERM".parse::<TerminationSignal>().unwrap(), TerminationSignal::Terminate);
        assert!("HUP".parse::<TerminationSignal>().is_err());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(TerminationOutcome::StillAlive(Presence::Zombie)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "STILL_ALIVE", "detail": "ZOMBIE"}));

        let json = serde_json::to_value(TerminationOutcome::Reaped).unwrap();
        assert_eq!(json, serde_json::json!({"state": "REAPED"}));
    }
}
