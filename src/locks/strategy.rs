//! The lock strategy interface shared by the file and null strategies.

use super::handle::LockHandle;
use super::types::{LockMode, StrategyKind};
use crate::error::{LockError, Result};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Capability set every lock strategy provides.
///
/// Implementations keep a private per-process lock table: a second request
/// for the mode an owner already holds only bumps the held-count, while a
/// request for a different mode is rejected with [`LockError::Misuse`] and
/// must go through [`upgrade`](Self::upgrade) or
/// [`downgrade`](Self::downgrade).
///
/// There is no fairness among contending acquirers. Under sustained
/// contention an acquirer can starve until its timeout elapses.
pub trait LockStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Take `path` in shared mode, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// * [`LockError::Timeout`] - not obtainable in time; nothing is held
    /// * [`LockError::Filesystem`] - the lock file could not be prepared
    /// * [`LockError::Misuse`] - the caller already holds `path` exclusively
    fn acquire_shared(&self, path: &Path, timeout: Duration) -> Result<LockHandle>;

    /// Take `path` in exclusive mode, waiting at most `timeout`.
    ///
    /// Errors mirror [`acquire_shared`](Self::acquire_shared).
    fn acquire_exclusive(&self, path: &Path, timeout: Duration) -> Result<LockHandle>;

    /// Trade a shared hold for an exclusive one.
    ///
    /// This is not atomic: the shared lock is released before the exclusive
    /// one is requested. On [`LockError::Upgrade`] the caller holds nothing
    /// on the resource and must start over. Any other error means nothing
    /// changed and `handle` is still valid.
    fn upgrade(&self, handle: &LockHandle, timeout: Duration) -> Result<LockHandle>;

    /// Trade an exclusive hold for a shared one.
    ///
    /// Same release-then-acquire shape as [`upgrade`](Self::upgrade); on
    /// [`LockError::Downgrade`] nothing is held.
    fn downgrade(&self, handle: &LockHandle) -> Result<LockHandle>;

    /// Retire one acquisition; the OS lock goes away with the last one.
    ///
    /// # Errors
    ///
    /// * [`LockError::Misuse`] - the handle was already released or replaced
    fn release(&self, handle: LockHandle) -> Result<()>;

    /// Mode the calling thread holds on `path`.
    fn held_mode(&self, path: &Path) -> LockMode;

    /// Acquire `path` in `mode`.
    fn acquire(&self, path: &Path, mode: LockMode, timeout: Duration) -> Result<LockHandle> {
        match mode {
            LockMode::Shared => self.acquire_shared(path, timeout),
            LockMode::Exclusive => self.acquire_exclusive(path, timeout),
            LockMode::None => Err(LockError::misuse(path, "cannot acquire a lock in mode none")),
        }
    }
}
