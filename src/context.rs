//! Lock context: the strategy selected for a run, plus call-site helpers.
//!
//! The context is built once at startup from [`Config`] and passed to every
//! call site that mutates shared state. Call sites never name a concrete
//! strategy, so a test or a degraded environment can swap coordination off
//! entirely by building the context differently. Nothing here is global: two
//! contexts with different strategies can live in the same process.

use crate::config::Config;
use crate::error::{LockError, Result};
use crate::locks::{
    FileLock, LockGuard, LockHandle, LockMode, LockStrategy, NullLock, StrategyKind,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Strategy selection and defaults shared by all lock call sites of a run.
#[derive(Debug, Clone)]
pub struct LockContext {
    strategy: Arc<dyn LockStrategy>,
    default_timeout: Duration,
    lock_root: Option<PathBuf>,
}

impl LockContext {
    /// Wrap an already-built strategy.
    pub fn new(strategy: Arc<dyn LockStrategy>, default_timeout: Duration) -> Self {
        Self {
            strategy,
            default_timeout,
            lock_root: None,
        }
    }

    /// Build the strategy named by `config`.
    pub fn from_config(config: &Config) -> Self {
        let strategy: Arc<dyn LockStrategy> = match config.locking {
            StrategyKind::File => Arc::new(FileLock::new(
                config.poll_settings(),
                config.default_timeout(),
            )),
            StrategyKind::Null => Arc::new(NullLock::new()),
        };
        debug!(strategy = config.locking.as_str(), "lock strategy selected");

        Self {
            strategy,
            default_timeout: config.default_timeout(),
            lock_root: config.lock_root.clone(),
        }
    }

    /// Context with coordination switched off.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullLock::new()), Config::default().default_timeout())
    }

    /// Resolve relative lock paths against `root`.
    pub fn with_lock_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.lock_root = Some(root.into());
        self
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn strategy(&self) -> &dyn LockStrategy {
        self.strategy.as_ref()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Path of the lock file for `path`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.lock_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.default_timeout)
    }

    /// Acquire `path` for reading (shared).
    pub fn acquire_read(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<LockHandle> {
        self.acquire(path.as_ref(), LockMode::Shared, timeout)
    }

    /// Acquire `path` for writing (exclusive).
    pub fn acquire_write(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<LockHandle> {
        self.acquire(path.as_ref(), LockMode::Exclusive, timeout)
    }

    pub fn acquire(
        &self,
        path: &Path,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> Result<LockHandle> {
        let path = self.resolve(path);
        self.strategy
            .acquire(&path, mode, self.timeout_or_default(timeout))
    }

    /// See [`LockStrategy::upgrade`]; on [`LockError::Upgrade`] nothing is held.
    pub fn upgrade(&self, handle: &LockHandle, timeout: Option<Duration>) -> Result<LockHandle> {
        self.strategy
            .upgrade(handle, self.timeout_or_default(timeout))
    }

    /// See [`LockStrategy::downgrade`]; on [`LockError::Downgrade`] nothing is held.
    pub fn downgrade(&self, handle: &LockHandle) -> Result<LockHandle> {
        self.strategy.downgrade(handle)
    }

    pub fn release(&self, handle: LockHandle) -> Result<()> {
        self.strategy.release(handle)
    }

    /// Mode the calling thread holds on `path`.
    pub fn held_mode(&self, path: impl AsRef<Path>) -> LockMode {
        self.strategy.held_mode(&self.resolve(path.as_ref()))
    }

    /// Acquire `path` in `mode` behind a guard that releases on drop.
    pub fn guard(
        &self,
        path: impl AsRef<Path>,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> Result<LockGuard<'_>> {
        let handle = self.acquire(path.as_ref(), mode, timeout)?;
        Ok(LockGuard::new(self.strategy(), handle))
    }

    pub fn read_guard(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<LockGuard<'_>> {
        self.guard(path, LockMode::Shared, timeout)
    }

    pub fn write_guard(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<LockGuard<'_>> {
        self.guard(path, LockMode::Exclusive, timeout)
    }

    /// Run `body` while holding `path` in `mode`.
    ///
    /// The lock is released on every exit path, including an error or a panic
    /// in `body`. When both `body` and the release fail, the body's error is
    /// returned and the release error is logged. `body` must not upgrade or
    /// downgrade the handle it is given; use a [`LockGuard`] for that.
    pub fn transaction<T, E, F>(
        &self,
        path: impl AsRef<Path>,
        mode: LockMode,
        timeout: Option<Duration>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&LockHandle) -> std::result::Result<T, E>,
        E: From<LockError>,
    {
        let guard = self.guard(path, mode, timeout)?;
        run_transaction(guard, body)
    }

    /// Run `body` while holding `path` shared. See [`transaction`](Self::transaction).
    pub fn read_transaction<T, E, F>(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&LockHandle) -> std::result::Result<T, E>,
        E: From<LockError>,
    {
        self.transaction(path, LockMode::Shared, timeout, body)
    }

    /// Run `body` while holding `path` exclusively. See [`transaction`](Self::transaction).
    pub fn write_transaction<T, E, F>(
        &self,
        path: impl AsRef<Path>,
        timeout: Option<Duration>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&LockHandle) -> std::result::Result<T, E>,
        E: From<LockError>,
    {
        self.transaction(path, LockMode::Exclusive, timeout, body)
    }
}

fn run_transaction<T, E, F>(guard: LockGuard<'_>, body: F) -> std::result::Result<T, E>
where
    F: FnOnce(&LockHandle) -> std::result::Result<T, E>,
    E: From<LockError>,
{
    let outcome = match guard.handle() {
        Some(handle) => body(handle),
        None => {
            let err = LockError::misuse(guard.path(), "transaction started without a lock");
            return Err(err.into());
        }
    };

    let path = guard.path().to_path_buf();
    match (outcome, guard.release()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release)) => {
            warn!(path = %path.display(), error = %release, "release failed after transaction error");
            Err(err)
        }
    }
}
