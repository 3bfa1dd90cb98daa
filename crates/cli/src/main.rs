//! Cascade CLI - kill a supervisor process and verify its whole descendant
//! tree went down with it.

mod logging;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use cascade_core::application::constants::{
    DEFAULT_PGREP_PROGRAM, DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT, DEFAULT_SETTLE_TIMEOUT,
};
use cascade_core::application::{DescendantEnumerator, TerminationVerifier, VerifierConfig};
use cascade_core::domain::{ProcessId, TerminationSignal};
use cascade_core::port::id_provider::UuidProvider;
use cascade_core::port::time_provider::SystemTimeProvider;
use cascade_core::port::{LaunchCommand, ProcessLister, ReadinessGate};
use cascade_infra_system::{
    become_subreaper, kill_and_reap, PgrepLister, ProcfsLister, ReapMode, TokioProcessLauncher,
    WaitStatusProbe,
};
use logging::LogFormat;

/// Exit status when at least one descendant survived
const EXIT_VERIFICATION_FAILED: u8 = 1;
/// Exit status when the run could not be completed at all
const EXIT_FATAL: u8 = 2;

#[cfg(target_os = "linux")]
const DEFAULT_LISTER: &str = "procfs";
#[cfg(not(target_os = "linux"))]
const DEFAULT_LISTER: &str = "pgrep";

#[derive(Parser)]
#[command(name = "cascade")]
#[command(about = "Verify that killing a supervisor terminates its entire process tree", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format (logs go to stderr)
    #[arg(long, env = "CASCADE_LOG_FORMAT", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a root process, kill it, and check that every descendant is gone
    Verify(VerifyArgs),

    /// Print the current descendant snapshot of a running process
    Descendants {
        /// Root process ID
        pid: i32,

        #[command(flatten)]
        listing: ListingArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ListerKind {
    /// Read /proc/<pid>/task/*/children (Linux)
    Procfs,
    /// Run `pgrep -P <pid>`
    Pgrep,
}

#[derive(Args)]
struct ListingArgs {
    /// How direct children are discovered
    #[arg(long, env = "CASCADE_LISTER", value_enum, default_value = DEFAULT_LISTER)]
    lister: ListerKind,

    /// pgrep-compatible binary used by `--lister pgrep`
    #[arg(long, env = "CASCADE_PGREP", default_value = DEFAULT_PGREP_PROGRAM)]
    pgrep: String,
}

impl ListingArgs {
    fn build(&self) -> Arc<dyn ProcessLister> {
        match self.lister {
            ListerKind::Procfs => Arc::new(ProcfsLister::new()),
            ListerKind::Pgrep => Arc::new(PgrepLister::with_program(self.pgrep.clone())),
        }
    }
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    listing: ListingArgs,

    /// Signal sent to the root (KILL or TERM)
    #[arg(long, env = "CASCADE_SIGNAL", default_value = "KILL")]
    signal: TerminationSignal,

    /// Time descendants get to disappear after the root exited
    #[arg(long, env = "CASCADE_SETTLE_TIMEOUT_MS", default_value_t = DEFAULT_SETTLE_TIMEOUT.as_millis() as u64)]
    settle_timeout_ms: u64,

    /// Pause between status sweeps while waiting
    #[arg(long, env = "CASCADE_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,

    /// Enumerate only after the root prints this line on stdout
    #[arg(long, env = "CASCADE_READY_LINE", conflicts_with = "startup_delay_ms")]
    ready_line: Option<String>,

    /// Upper bound for --ready-line
    #[arg(long, env = "CASCADE_READY_TIMEOUT_MS", default_value_t = DEFAULT_READY_TIMEOUT.as_millis() as u64)]
    ready_timeout_ms: u64,

    /// Enumerate after a fixed delay instead of immediately
    #[arg(long, env = "CASCADE_STARTUP_DELAY_MS")]
    startup_delay_ms: Option<u64>,

    /// Become a child subreaper so orphaned descendants are adopted and
    /// reaped by this process (Linux)
    #[arg(long, env = "CASCADE_ADOPT_ORPHANS")]
    adopt_orphans: bool,

    /// Trust `ECHILD` alone instead of confirming with kill(pid, 0)
    #[arg(long, env = "CASCADE_NO_LIVENESS_CHECK")]
    no_liveness_check: bool,

    /// SIGKILL and reap surviving descendants after a failed run
    #[arg(long, env = "CASCADE_KILL_SURVIVORS")]
    kill_survivors: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Root command, e.g. `-- runsc do sleep 10000`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl VerifyArgs {
    fn config(&self) -> VerifierConfig {
        VerifierConfig {
            signal: self.signal,
            settle_timeout: Duration::from_millis(self.settle_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    fn launch_command(&self) -> Result<LaunchCommand> {
        let (program, args) = self
            .command
            .split_first()
            .context("Missing root command")?;

        let readiness = match (&self.ready_line, self.startup_delay_ms) {
            (Some(line), _) => ReadinessGate::StdoutLine(line.clone()),
            (None, Some(ms)) => ReadinessGate::Delay(Duration::from_millis(ms)),
            (None, None) => ReadinessGate::Immediate,
        };

        Ok(LaunchCommand::new(program.clone())
            .args(args.iter().cloned())
            .readiness(readiness)
            .ready_timeout(Duration::from_millis(self.ready_timeout_ms)))
    }
}

async fn verify(args: VerifyArgs) -> Result<ExitCode> {
    let mode = if args.adopt_orphans {
        become_subreaper().context("Failed to register as child subreaper")?;
        ReapMode::AdoptOrphans
    } else {
        ReapMode::Strict
    };
    let mut probe = WaitStatusProbe::new(mode);
    if args.no_liveness_check {
        probe = probe.without_liveness_check();
    }

    let command = args.launch_command()?;
    let verifier = TerminationVerifier::new(
        Arc::new(TokioProcessLauncher::new()),
        args.listing.build(),
        Arc::new(probe),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        args.config(),
    );

    let report = verifier
        .run(&command)
        .await
        .with_context(|| format!("Verification of `{}` aborted", command))?;

    render::report(&report, args.json)?;

    if report.passed() {
        return Ok(ExitCode::SUCCESS);
    }

    if args.kill_survivors {
        let survivors = report.survivors();
        let killed = kill_and_reap(&survivors).await;
        if !args.json {
            println!();
            println!(
                "  {} killed {} of {} survivor(s)",
                "•".yellow(),
                killed,
                survivors.len()
            );
        }
    }

    Ok(ExitCode::from(EXIT_VERIFICATION_FAILED))
}

async fn descendants(pid: i32, listing: ListingArgs, json: bool) -> Result<ExitCode> {
    let root = ProcessId::new(pid)?;
    let enumerator = DescendantEnumerator::new(listing.build());

    let snapshot = enumerator
        .descendants(root)
        .await
        .with_context(|| format!("Failed to enumerate descendants of {}", root))?;

    render::snapshot(root, &snapshot, json)?;
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("{} logging disabled: {:#}", "!".yellow(), e);
    }

    info!("Cascade v{} starting...", cascade_core::VERSION);

    let result = match cli.command {
        Commands::Verify(args) => verify(args).await,
        Commands::Descendants { pid, listing, json } => descendants(pid, listing, json).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "Fatal error");
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
