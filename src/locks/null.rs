//! Lock strategy that performs no coordination.
//!
//! Every call succeeds immediately without touching the filesystem. The
//! lock table is still maintained, so reentrancy counts, double-release
//! detection and mode-transition rules match the file strategy exactly.

use super::handle::LockHandle;
use super::poll::Deadline;
use super::strategy::LockStrategy;
use super::table::LockTable;
use super::types::{LockMode, Owner, StrategyKind};
use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tracing::trace;

/// Always-succeeding lock strategy.
#[derive(Debug, Default)]
pub struct NullLock {
    table: LockTable<()>,
}

impl NullLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held-count of the calling thread on `path`.
    pub fn held_count(&self, path: &Path) -> u32 {
        self.table.held_count(path, Owner::current())
    }

    fn enter(&self, path: &Path, mode: LockMode, timeout: Duration) -> Result<LockHandle> {
        let deadline = Deadline::after(timeout);
        let handle = self
            .table
            .enter(path, mode, Owner::current(), deadline.at(), ())?;
        trace!(path = %path.display(), %mode, held_count = handle.held_count(), "null lock acquired");
        Ok(handle)
    }
}

impl LockStrategy for NullLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Null
    }

    fn acquire_shared(&self, path: &Path, timeout: Duration) -> Result<LockHandle> {
        self.enter(path, LockMode::Shared, timeout)
    }

    fn acquire_exclusive(&self, path: &Path, timeout: Duration) -> Result<LockHandle> {
        self.enter(path, LockMode::Exclusive, timeout)
    }

    fn upgrade(&self, handle: &LockHandle, timeout: Duration) -> Result<LockHandle> {
        self.table.take_sole(handle, LockMode::Shared)?;
        self.enter(handle.path(), LockMode::Exclusive, timeout)
    }

    fn downgrade(&self, handle: &LockHandle) -> Result<LockHandle> {
        self.table.take_sole(handle, LockMode::Exclusive)?;
        self.enter(handle.path(), LockMode::Shared, Duration::ZERO)
    }

    fn release(&self, handle: LockHandle) -> Result<()> {
        self.table.release(&handle)?;
        trace!(path = %handle.path().display(), "null lock released");
        Ok(())
    }

    fn held_mode(&self, path: &Path) -> LockMode {
        self.table.mode_of(path, Owner::current())
    }
}
