//! Process-tree fixture
//!
//! Spawns a tree of copies of itself, e.g. `--shape 2,1`: this process gets
//! 2 children and each of them 1 child (4 descendants). Every non-root node
//! arms a parent-death signal (SIGKILL), so killing the root cascades down
//! the whole tree, unless `--unguarded` / `--unguarded-leaves` disarm it.
//!
//! A node prints `ready` once its entire subtree is up, then sleeps forever.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

const READY_LINE: &str = "ready";

#[derive(Parser)]
#[command(name = "tree-fixture")]
struct Args {
    /// Children per level, outermost first
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    shape: Vec<usize>,

    /// No node arms the parent-death signal
    #[arg(long)]
    unguarded: bool,

    /// Leaf nodes do not arm the parent-death signal
    #[arg(long)]
    unguarded_leaves: bool,

    /// Pid of the spawning node (set for every non-root node)
    #[arg(long)]
    expect_parent: Option<i32>,
}

impl Args {
    fn child_command(&self, exe: &std::path::Path, rest: &[usize]) -> Command {
        let mut cmd = Command::new(exe);
        cmd.arg("--expect-parent").arg(std::process::id().to_string());
        if !rest.is_empty() {
            let shape: Vec<String> = rest.iter().map(|w| w.to_string()).collect();
            cmd.arg("--shape").arg(shape.join(","));
        }
        if self.unguarded {
            cmd.arg("--unguarded");
        }
        if self.unguarded_leaves {
            cmd.arg("--unguarded-leaves");
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::piped());
        cmd
    }
}

#[cfg(target_os = "linux")]
fn arm_parent_death_signal() -> Result<()> {
    nix::sys::prctl::set_pdeathsig(nix::sys::signal::Signal::SIGKILL)
        .context("prctl(PR_SET_PDEATHSIG)")
}

#[cfg(not(target_os = "linux"))]
fn arm_parent_death_signal() -> Result<()> {
    bail!("parent-death signals need Linux")
}

fn spawn_ready_child(mut cmd: Command) -> Result<Child> {
    let mut child = cmd.spawn().context("spawn child node")?;
    let stdout = child.stdout.take().context("child stdout not piped")?;

    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line)?;
    if line.trim() != READY_LINE {
        bail!("child {} exited before it was ready", child.id());
    }
    Ok(child)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let is_leaf = args.shape.is_empty();
    let guarded = !args.unguarded && !(is_leaf && args.unguarded_leaves);

    if let Some(parent) = args.expect_parent {
        if guarded {
            arm_parent_death_signal()?;
            // Parent died before the signal was armed: nobody will send it
            if nix::unistd::getppid().as_raw() != parent {
                return Ok(());
            }
        }
    }

    let exe = std::env::current_exe().context("locate fixture binary")?;
    let mut children = Vec::new();
    if let Some((&width, rest)) = args.shape.split_first() {
        for _ in 0..width {
            children.push(spawn_ready_child(args.child_command(&exe, rest))?);
        }
    }

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", READY_LINE)?;
    stdout.flush()?;

    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
