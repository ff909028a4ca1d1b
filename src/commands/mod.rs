//! Command implementations for buildlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command goes through the run's [`LockContext`],
//! so `--locking null` switches coordination off for all of them at once.

use crate::cli::{Command, HoldArgs, ProbeArgs, RunArgs};
use crate::context::LockContext;
use crate::error::{LockError, Result};
use crate::exit_codes;
use crate::locks::{LockMode, StrategyKind};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::process::{self, ExitStatus};
use std::time::Duration;
use tracing::{info, warn};

/// Dispatch a command to its implementation.
///
/// Returns the process exit code on success. `run` passes through the exit
/// code of the command it wrapped.
pub fn dispatch(command: Command, ctx: &LockContext) -> Result<i32> {
    match command {
        Command::Hold(args) => cmd_hold(args, ctx),
        Command::Run(args) => cmd_run(args, ctx),
        Command::Probe(args) => cmd_probe(args, ctx),
    }
}

fn cmd_hold(args: HoldArgs, ctx: &LockContext) -> Result<i32> {
    let guard = ctx.guard(&args.path, args.mode.mode(), args.timeout)?;

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "acquired {} {}", guard.mode(), guard.path().display())
        .and_then(|()| stdout.flush())
    {
        warn!(error = %e, "failed to report acquisition on stdout");
    }
    drop(stdout);

    // Hold until whoever started us closes our stdin.
    if let Err(e) = io::copy(&mut io::stdin().lock(), &mut io::sink()) {
        warn!(error = %e, "stdin closed with an error, releasing");
    }

    guard.release()?;
    Ok(exit_codes::SUCCESS)
}

fn cmd_run(args: RunArgs, ctx: &LockContext) -> Result<i32> {
    let Some((program, rest)) = args.command.split_first() else {
        return Err(LockError::Config("no command given to run".to_string()));
    };

    let status = ctx.transaction(&args.path, args.mode.mode(), args.timeout, |handle| {
        info!(path = %handle.path().display(), mode = %handle.mode(), %program, "running under lock");
        process::Command::new(program)
            .args(rest)
            .status()
            .map_err(|source| LockError::Command {
                program: program.clone(),
                source,
            })
    })?;

    Ok(exit_code_of(status))
}

/// Exit code of a finished child, `128 + signal` when it was killed the way
/// a shell reports it.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    exit_codes::USER_ERROR
}

/// What `probe` observed about a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    /// Nobody holds it; a writer could take it now.
    Free,
    /// Readers hold it; another reader could take it now.
    Shared,
    /// A writer holds it.
    Exclusive,
}

impl ProbeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeState::Free => "free",
            ProbeState::Shared => "shared",
            ProbeState::Exclusive => "exclusive",
        }
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    path: &'a Path,
    state: ProbeState,
    strategy: StrategyKind,
}

/// Find out how `path` is held without waiting and without keeping a lock.
///
/// A hold of the calling thread is reported as is; trial acquisitions would
/// only reenter it.
pub fn probe(ctx: &LockContext, path: &Path) -> Result<ProbeState> {
    match ctx.held_mode(path) {
        LockMode::Exclusive => return Ok(ProbeState::Exclusive),
        LockMode::Shared => return Ok(ProbeState::Shared),
        LockMode::None => {}
    }
    if try_briefly(ctx, path, LockMode::Exclusive)? {
        return Ok(ProbeState::Free);
    }
    if try_briefly(ctx, path, LockMode::Shared)? {
        return Ok(ProbeState::Shared);
    }
    Ok(ProbeState::Exclusive)
}

fn try_briefly(ctx: &LockContext, path: &Path, mode: LockMode) -> Result<bool> {
    match ctx.acquire(path, mode, Some(Duration::ZERO)) {
        Ok(handle) => {
            ctx.release(handle)?;
            Ok(true)
        }
        Err(LockError::Timeout { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

fn cmd_probe(args: ProbeArgs, ctx: &LockContext) -> Result<i32> {
    let state = probe(ctx, &args.path)?;
    let resolved = ctx.resolve(&args.path);

    if args.json {
        let report = ProbeReport {
            path: &resolved,
            state,
            strategy: ctx.kind(),
        };
        let json = serde_json::to_string_pretty(&report).map_err(LockError::Report)?;
        println!("{}", json);
    } else {
        println!("{} {}", state.as_str(), resolved.display());
    }

    Ok(exit_codes::SUCCESS)
}
