//! Buildlock: cross-process locks for concurrent package builds.
//!
//! This is the main entry point for the `buildlock` CLI. It parses arguments,
//! builds the lock context for the run, dispatches to the appropriate command
//! handler, and handles errors with proper exit codes.

use buildlock::cli::Cli;
use buildlock::config::Config;
use buildlock::context::LockContext;
use buildlock::error::Result;
use buildlock::{commands, logging};
use std::process::ExitCode;

fn build_context(cli: &Cli) -> Result<LockContext> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut config = config.with_env_overrides(|key| std::env::var(key).ok())?;

    // The command line beats both the file and the environment
    if let Some(kind) = cli.locking {
        config.locking = kind;
    }

    Ok(LockContext::from_config(&config))
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let outcome = build_context(&cli).and_then(|ctx| commands::dispatch(cli.command, &ctx));

    match outcome {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
