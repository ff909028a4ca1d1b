//! Buildlock: cross-process advisory locking for concurrent package builds.
//!
//! Build workers that share an install prefix or a metadata index take a
//! shared or exclusive lock on a path before touching it. The strategy
//! behind those locks is chosen once per run through a [`LockContext`]:
//! real OS advisory locks, or no coordination at all.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod locks;
pub mod logging;

pub use config::Config;
pub use context::LockContext;
pub use error::{LockError, Result};
pub use locks::{
    FileLock, LockGuard, LockHandle, LockMode, LockStrategy, NullLock, PollSettings, StrategyKind,
};
