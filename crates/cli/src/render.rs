//! Report rendering (table or JSON on stdout)

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use cascade_core::domain::{
    DescendantSet, ProcessId, TerminationOutcome, VerificationFailure, VerificationReport,
};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    order: usize,
    #[tabled(rename = "PID")]
    pid: i32,
    #[tabled(rename = "OUTCOME")]
    outcome: String,
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "#")]
    order: usize,
    #[tabled(rename = "PID")]
    pid: i32,
}

#[derive(Serialize)]
struct ReportView<'a> {
    passed: bool,
    failures: Vec<VerificationFailure>,
    #[serde(flatten)]
    report: &'a VerificationReport,
}

#[derive(Serialize)]
struct SnapshotView<'a> {
    root: ProcessId,
    count: usize,
    descendants: &'a DescendantSet,
}

fn outcome_cell(outcome: &TerminationOutcome) -> String {
    match outcome {
        TerminationOutcome::Reaped => outcome.to_string().green().to_string(),
        TerminationOutcome::StillAlive(_) => outcome.to_string().red().bold().to_string(),
        TerminationOutcome::Error(_) => outcome.to_string().yellow().to_string(),
    }
}

pub fn report(report: &VerificationReport, json: bool) -> Result<()> {
    if json {
        let view = ReportView {
            passed: report.passed(),
            failures: report.failures(),
            report,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{}", "Termination Verification".cyan().bold());
    println!();
    println!("  {} {}", "Run:".bold(), report.run_id);
    println!("  {} {}", "Root:".bold(), report.root);
    println!("  {} {}", "Signal:".bold(), report.signal);
    println!("  {} {}", "Root exit:".bold(), report.root_exit);
    println!("  {} {}", "Descendants:".bold(), report.descendants.len());
    println!("  {} {} ms", "Duration:".bold(), report.duration_ms());
    println!();

    if !report.outcomes.is_empty() {
        let rows: Vec<OutcomeRow> = report
            .outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| OutcomeRow {
                order: i + 1,
                pid: o.pid.as_raw(),
                outcome: outcome_cell(&o.outcome),
            })
            .collect();
        println!("{}", Table::new(rows));
        println!();
    }

    let failures = report.failures();
    if failures.is_empty() {
        println!("{}", "✓ PASS: every descendant terminated".green().bold());
    } else {
        println!(
            "{}",
            format!("✗ FAIL: {} descendant(s) did not terminate", failures.len())
                .red()
                .bold()
        );
        for failure in &failures {
            println!("  {} {}", "•".red(), failure);
        }
    }

    Ok(())
}

pub fn snapshot(root: ProcessId, descendants: &DescendantSet, json: bool) -> Result<()> {
    if json {
        let view = SnapshotView {
            root,
            count: descendants.len(),
            descendants,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if descendants.is_empty() {
        println!("{}", format!("Process {} has no descendants", root).yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Descendants of {} ({})", root, descendants.len())
            .cyan()
            .bold()
    );
    let rows: Vec<SnapshotRow> = descendants
        .iter()
        .enumerate()
        .map(|(i, pid)| SnapshotRow {
            order: i + 1,
            pid: pid.as_raw(),
        })
        .collect();
    println!("{}", Table::new(rows));

    Ok(())
}
