//! OS advisory-lock strategy.
//!
//! Each resource is a zero-length lock file. Locks are taken with `flock`-style
//! advisory locks through `fs2`, so compatibility between shared and exclusive
//! holders in different processes is decided entirely by the OS.
//!
//! # Crash safety
//!
//! The lock file carries no owner metadata and is never checked for
//! staleness. A holder that dies loses its lock when the OS closes its
//! descriptors; nothing else cleans up after it. Filesystems without working
//! advisory locks must run with the null strategy instead.

use super::handle::LockHandle;
use super::poll::{Backoff, Deadline, PollSettings};
use super::strategy::LockStrategy;
use super::table::{Claim, LockTable};
use super::types::{LockMode, Owner, StrategyKind};
use crate::error::{LockError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lock strategy backed by OS advisory locks on lock files.
#[derive(Debug)]
pub struct FileLock {
    poll: PollSettings,
    /// Budget for re-taking the shared lock during a downgrade.
    downgrade_timeout: Duration,
    table: LockTable<File>,
}

impl FileLock {
    pub fn new(poll: PollSettings, downgrade_timeout: Duration) -> Self {
        Self {
            poll,
            downgrade_timeout,
            table: LockTable::new(),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Held-count of the calling thread on `path`.
    pub fn held_count(&self, path: &Path) -> u32 {
        self.table.held_count(path, Owner::current())
    }

    /// Number of resources this process currently holds.
    pub fn active_locks(&self) -> usize {
        self.table.active()
    }

    fn acquire_mode(&self, path: &Path, mode: LockMode, timeout: Duration) -> Result<LockHandle> {
        let owner = Owner::current();
        let deadline = Deadline::after(timeout);
        let mut backoff = Backoff::new(self.poll);
        let mut prepared = false;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let claim = self.table.claim(path, mode, owner, deadline.at(), || {
                if !prepared {
                    ensure_parent(path)?;
                    prepared = true;
                }
                try_lock(path, mode)
            })?;

            if let Claim::Held { handle, reentered } = claim {
                debug!(
                    path = %path.display(),
                    %mode,
                    held_count = handle.held_count(),
                    attempts,
                    waited_ms = deadline.elapsed().as_millis() as u64,
                    reentered,
                    "acquired lock"
                );
                return Ok(handle);
            }

            let Some(delay) = deadline.sleep_for(backoff.next_delay()) else {
                debug!(path = %path.display(), %mode, attempts, "lock wait timed out");
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    mode,
                    waited: deadline.elapsed(),
                    attempts,
                });
            };

            trace!(path = %path.display(), %mode, attempts, ?delay, "lock busy, polling");
            thread::sleep(delay);
        }
    }

    fn unlock(&self, path: &Path, file: File) {
        // Closing the descriptor drops the lock even if the explicit unlock fails.
        if let Err(e) = FileExt::unlock(&file) {
            warn!(path = %path.display(), error = %e, "failed to unlock, closing descriptor");
        }
        drop(file);
    }
}

impl Default for FileLock {
    fn default() -> Self {
        Self::new(PollSettings::default(), Duration::from_secs(60))
    }
}

impl LockStrategy for FileLock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::File
    }

    fn acquire_shared(&self, path: &Path, timeout: Duration) -> Result<LockHandle> {
        self.acquire_mode(path, LockMode::Shared, timeout)
    }

    fn acquire_exclusive(&self, path: &Path, timeout: Duration) -> Result<LockHandle> {
        self.acquire_mode(path, LockMode::Exclusive, timeout)
    }

    fn upgrade(&self, handle: &LockHandle, timeout: Duration) -> Result<LockHandle> {
        let deadline = Deadline::after(timeout);
        let path = handle.path();

        let file = self.table.take_sole(handle, LockMode::Shared)?;
        self.unlock(path, file);
        debug!(path = %path.display(), "released shared lock for upgrade");

        let remaining = timeout.saturating_sub(deadline.elapsed());
        self.acquire_mode(path, LockMode::Exclusive, remaining)
            .map_err(|source| {
                warn!(path = %path.display(), error = %source, "upgrade failed, no lock held");
                LockError::Upgrade {
                    path: path.to_path_buf(),
                    source: Box::new(source),
                }
            })
    }

    fn downgrade(&self, handle: &LockHandle) -> Result<LockHandle> {
        let path = handle.path();

        let file = self.table.take_sole(handle, LockMode::Exclusive)?;
        self.unlock(path, file);
        debug!(path = %path.display(), "released exclusive lock for downgrade");

        self.acquire_mode(path, LockMode::Shared, self.downgrade_timeout)
            .map_err(|source| {
                warn!(path = %path.display(), error = %source, "downgrade failed, no lock held");
                LockError::Downgrade {
                    path: path.to_path_buf(),
                    source: Box::new(source),
                }
            })
    }

    fn release(&self, handle: LockHandle) -> Result<()> {
        let path = handle.path();
        match self.table.release(&handle)? {
            Some(file) => {
                self.unlock(path, file);
                debug!(path = %path.display(), mode = %handle.mode(), "released lock");
            }
            None => {
                trace!(path = %path.display(), mode = %handle.mode(), "released nested acquisition");
            }
        }
        Ok(())
    }

    fn held_mode(&self, path: &Path) -> LockMode {
        self.table.mode_of(path, Owner::current())
    }
}

/// Create missing parent directories of the lock file.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| LockError::filesystem(parent, e))?;
    }
    Ok(())
}

/// Open (creating if needed) the lock file. Falls back to read-only for
/// lock files this user may lock but not write.
fn open_lock_file(path: &Path) -> io::Result<File> {
    let writable = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path);

    match writable {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && path.is_file() => {
            File::open(path).map_err(|_| e)
        }
        other => other,
    }
}

/// One non-blocking attempt. `Ok(None)` means another holder is in the way.
fn try_lock(path: &Path, mode: LockMode) -> Result<Option<File>> {
    let file = open_lock_file(path).map_err(|e| LockError::filesystem(path, e))?;

    let attempt = match mode {
        LockMode::Shared => FileExt::try_lock_shared(&file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        LockMode::None => {
            return Err(LockError::misuse(path, "cannot acquire a lock in mode none"));
        }
    };

    match attempt {
        Ok(()) => Ok(Some(file)),
        Err(e) if is_contended(&e) => Ok(None),
        Err(e) => Err(LockError::filesystem(path, e)),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
