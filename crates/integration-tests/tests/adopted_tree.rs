// End-to-end runs against real process trees, with this test binary acting
// as child subreaper. Subreaper is process-wide, hence a separate binary
// from strict_probe.
#![cfg(target_os = "linux")]

use std::collections::BTreeSet;
use std::sync::{Arc, Once};
use std::time::Duration;

use cascade_core::application::{DescendantEnumerator, TerminationVerifier, VerifierConfig};
use cascade_core::domain::{ProcessId, TerminationOutcome, TerminationSignal};
use cascade_core::port::id_provider::UuidProvider;
use cascade_core::port::time_provider::SystemTimeProvider;
use cascade_core::port::{
    LaunchCommand, ProcessLauncher, ProcessLister, ReadinessGate, RootProcess,
};
use cascade_infra_system::{
    become_subreaper, kill_and_reap, PgrepLister, ProcfsLister, TokioProcessLauncher,
    WaitStatusProbe,
};

const FIXTURE: &str = env!("CARGO_BIN_EXE_tree-fixture");

static SUBREAPER: Once = Once::new();

fn adopt_orphans() {
    SUBREAPER.call_once(|| become_subreaper().expect("prctl(PR_SET_CHILD_SUBREAPER)"));
}

fn fixture(args: &[&str]) -> LaunchCommand {
    LaunchCommand::new(FIXTURE)
        .args(args.iter().copied())
        .readiness(ReadinessGate::StdoutLine("ready".to_string()))
        .ready_timeout(Duration::from_secs(10))
}

fn verifier(settle_timeout: Duration) -> TerminationVerifier {
    TerminationVerifier::new(
        Arc::new(TokioProcessLauncher::new()),
        Arc::new(ProcfsLister::new()),
        Arc::new(WaitStatusProbe::adopting()),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        VerifierConfig {
            signal: TerminationSignal::Kill,
            settle_timeout,
            poll_interval: Duration::from_millis(20),
        },
    )
}

fn pgrep_available() -> bool {
    std::process::Command::new("pgrep")
        .arg("-V")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

async fn stop(mut root: Box<dyn RootProcess>, descendants: &[ProcessId]) {
    root.signal(TerminationSignal::Kill).unwrap();
    root.wait().await.unwrap();
    kill_and_reap(descendants).await;
}

#[tokio::test]
async fn test_enumeration_finds_every_descendant() {
    adopt_orphans();
    let root = TokioProcessLauncher::new()
        .launch(&fixture(&["--shape", "2,1"]))
        .await
        .unwrap();
    let lister: Arc<dyn ProcessLister> = Arc::new(ProcfsLister::new());
    let enumerator = DescendantEnumerator::new(lister.clone());

    let snapshot = enumerator.descendants(root.id()).await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert!(!snapshot.contains(root.id()));

    // Pre-order: each first-level child is followed by its own child
    let first_level = lister.direct_children(root.id()).await.unwrap();
    assert_eq!(first_level.len(), 2);
    let order = snapshot.as_slice();
    assert_eq!(order[0], first_level[0]);
    assert_eq!(order[2], first_level[1]);
    assert_eq!(lister.direct_children(order[0]).await.unwrap(), vec![order[1]]);
    assert_eq!(lister.direct_children(order[2]).await.unwrap(), vec![order[3]]);

    stop(root, snapshot.as_slice()).await;
}

#[tokio::test]
async fn test_enumeration_is_repeatable() {
    adopt_orphans();
    let root = TokioProcessLauncher::new()
        .launch(&fixture(&["--shape", "3"]))
        .await
        .unwrap();
    let enumerator = DescendantEnumerator::new(Arc::new(ProcfsLister::new()));

    let first = enumerator.descendants(root.id()).await.unwrap();
    let second = enumerator.descendants(root.id()).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first.as_set(), second.as_set());

    stop(root, first.as_slice()).await;
}

#[tokio::test]
async fn test_procfs_and_pgrep_agree() {
    if !pgrep_available() {
        eprintln!("pgrep not installed, skipping");
        return;
    }
    adopt_orphans();
    let root = TokioProcessLauncher::new()
        .launch(&fixture(&["--shape", "2,2"]))
        .await
        .unwrap();

    let procfs = DescendantEnumerator::new(Arc::new(ProcfsLister::new()))
        .descendants(root.id())
        .await
        .unwrap();
    let pgrep = DescendantEnumerator::new(Arc::new(PgrepLister::new()))
        .descendants(root.id())
        .await
        .unwrap();

    assert_eq!(procfs.len(), 6);
    assert_eq!(procfs.as_set(), pgrep.as_set());

    stop(root, procfs.as_slice()).await;
}

#[tokio::test]
async fn test_leaf_root_has_nothing_to_verify() {
    adopt_orphans();
    let report = verifier(Duration::from_secs(2))
        .run(&fixture(&[]))
        .await
        .unwrap();

    assert!(report.descendants.is_empty());
    assert!(report.outcomes.is_empty());
    assert!(report.passed());
    assert_eq!(report.root_exit.signal, Some(9));
}

#[tokio::test]
async fn test_guarded_tree_goes_down_with_root() {
    adopt_orphans();
    let report = verifier(Duration::from_secs(5))
        .run(&fixture(&["--shape", "2,1"]))
        .await
        .unwrap();

    assert_eq!(report.descendants.len(), 4);
    assert_eq!(report.outcomes.len(), 4);
    assert!(report.passed(), "failures: {:?}", report.failures());
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.outcome == TerminationOutcome::Reaped));
}

#[tokio::test]
async fn test_unguarded_leaves_are_named_as_survivors() {
    adopt_orphans();
    let report = verifier(Duration::from_millis(500))
        .run(&fixture(&["--shape", "2,1", "--unguarded-leaves"]))
        .await
        .unwrap();

    assert!(!report.passed());
    assert_eq!(report.descendants.len(), 4);

    // Pre-order puts the two leaves at positions 1 and 3
    let order = report.descendants.as_slice();
    let expected: BTreeSet<ProcessId> = [order[1], order[3]].into_iter().collect();
    let survivors = report.survivors();
    assert_eq!(survivors.iter().copied().collect::<BTreeSet<_>>(), expected);

    // The guarded middle layer died and was reaped by us
    for pid in [order[0], order[2]] {
        let outcome = report.outcomes.iter().find(|o| o.pid == pid).unwrap();
        assert_eq!(outcome.outcome, TerminationOutcome::Reaped);
    }

    assert_eq!(kill_and_reap(&survivors).await, 2);
}
