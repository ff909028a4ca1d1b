//! RAII lock guard implementation.

use super::handle::LockHandle;
use super::strategy::LockStrategy;
use super::types::LockMode;
use crate::error::{LockError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// RAII guard for one acquisition.
///
/// When dropped, the acquisition is released. If the release fails, a
/// warning is logged but no panic occurs.
#[derive(Debug)]
pub struct LockGuard<'a> {
    strategy: &'a dyn LockStrategy,

    /// Path of the guarded resource, kept after the hold is gone.
    path: PathBuf,

    /// `None` once released, or after a failed mode transition.
    handle: Option<LockHandle>,
}

impl<'a> LockGuard<'a> {
    pub(crate) fn new(strategy: &'a dyn LockStrategy, handle: LockHandle) -> Self {
        Self {
            strategy,
            path: handle.path().to_path_buf(),
            handle: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    /// Current mode, `LockMode::None` when nothing is held.
    pub fn mode(&self) -> LockMode {
        self.handle.as_ref().map_or(LockMode::None, LockHandle::mode)
    }

    pub fn is_held(&self) -> bool {
        self.handle.is_some()
    }

    /// Upgrade the guarded hold to exclusive.
    ///
    /// On [`LockError::Upgrade`] the guard is left empty: the shared lock is
    /// gone and the exclusive one was never obtained.
    pub fn upgrade(&mut self, timeout: Duration) -> Result<()> {
        let handle = self.current()?;
        let outcome = self.strategy.upgrade(handle, timeout);
        self.settle(outcome)
    }

    /// Downgrade the guarded hold to shared.
    ///
    /// On [`LockError::Downgrade`] the guard is left empty.
    pub fn downgrade(&mut self) -> Result<()> {
        let handle = self.current()?;
        let outcome = self.strategy.downgrade(handle);
        self.settle(outcome)
    }

    /// Manually release the lock.
    ///
    /// This is useful when you want to release the lock before the guard
    /// goes out of scope, and want to handle errors explicitly.
    pub fn release(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.strategy.release(handle),
            None => Ok(()),
        }
    }

    fn current(&self) -> Result<&LockHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| LockError::misuse(&self.path, "guard no longer holds a lock"))
    }

    fn settle(&mut self, outcome: Result<LockHandle>) -> Result<()> {
        match outcome {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err @ (LockError::Upgrade { .. } | LockError::Downgrade { .. })) => {
                self.handle = None;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = self.strategy.release(handle)
        {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}
