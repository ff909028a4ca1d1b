//! CLI argument parsing for buildlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::locks::{LockMode, StrategyKind};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Buildlock: cross-process locks for concurrent package builds.
///
/// Build workers wrap every mutation of a shared install prefix or index
/// file in a lock on a path. Lock files are empty and created on demand.
#[derive(Parser, Debug)]
#[command(name = "buildlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (YAML) with strategy, timeout and polling settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the lock strategy for this run (file or null).
    #[arg(long, global = true, value_parser = parse_strategy)]
    pub locking: Option<StrategyKind>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for buildlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire a lock and hold it until stdin is closed.
    ///
    /// Prints `acquired <mode> <path>` once the lock is held.
    Hold(HoldArgs),

    /// Run a command while holding a lock.
    ///
    /// The lock is released when the command exits, whatever its status.
    Run(RunArgs),

    /// Report whether a lock is currently free, shared, or exclusive.
    ///
    /// Never waits and never leaves a lock behind.
    Probe(ProbeArgs),
}

/// Lock mode selection shared by `hold` and `run`.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ModeArgs {
    /// Take a shared (read) lock.
    #[arg(long)]
    pub read: bool,

    /// Take an exclusive (write) lock.
    #[arg(long)]
    pub write: bool,
}

impl ModeArgs {
    pub fn mode(&self) -> LockMode {
        if self.write {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        }
    }
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// Lock file identifying the resource.
    pub path: PathBuf,

    /// Seconds to wait for the lock (default from config).
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// Lock file identifying the resource.
    pub path: PathBuf,

    /// Seconds to wait for the lock (default from config).
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Command and arguments to run under the lock.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the `probe` command.
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Lock file identifying the resource.
    pub path: PathBuf,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    StrategyKind::from_str(s).ok_or_else(|| format!("unknown strategy '{}' (use file or null)", s))
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{}': {}", s, e))
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_hold_write() {
        let cli = Cli::try_parse_from(["buildlock", "hold", "--write", "/opt/prefix/.lock"]).unwrap();
        if let Command::Hold(args) = cli.command {
            assert_eq!(args.mode.mode(), LockMode::Exclusive);
            assert_eq!(args.path, PathBuf::from("/opt/prefix/.lock"));
            assert!(args.timeout.is_none());
        } else {
            panic!("Expected Hold command");
        }
    }

    #[test]
    fn parse_hold_requires_a_mode() {
        assert!(Cli::try_parse_from(["buildlock", "hold", "x.lock"]).is_err());
        assert!(Cli::try_parse_from(["buildlock", "hold", "--read", "--write", "x.lock"]).is_err());
    }

    #[test]
    fn parse_run_with_command() {
        let cli = Cli::try_parse_from([
            "buildlock",
            "run",
            "--read",
            "--timeout",
            "1.5",
            "index.lock",
            "--",
            "cat",
            "index.json",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.mode.mode(), LockMode::Shared);
            assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
            assert_eq!(args.command, vec!["cat", "index.json"]);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn parse_run_requires_command() {
        assert!(Cli::try_parse_from(["buildlock", "run", "--write", "x.lock"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "buildlock",
            "probe",
            "x.lock",
            "--json",
            "--locking",
            "null",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.locking, Some(StrategyKind::Null));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Probe(ProbeArgs { json: true, .. })));
    }

    #[test]
    fn parse_rejects_negative_timeout() {
        let result = Cli::try_parse_from(["buildlock", "hold", "--read", "--timeout", "-1", "x.lock"]);
        assert!(result.is_err());
    }
}
