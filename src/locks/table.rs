//! Per-process lock table with reentrancy bookkeeping.
//!
//! Both strategies keep their holds here so reentrancy, misuse detection and
//! mode-transition preconditions behave identically whether or not an OS lock
//! sits behind an entry. `R` is the backing resource: an open `File` for the
//! file strategy, `()` for the null strategy.

use super::handle::LockHandle;
use super::types::{LockMode, Owner};
use crate::error::{LockError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Source of generation and ticket ids. Shared by every table so a handle
/// presented to the wrong table never matches by accident.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// One owner's hold on one resource.
#[derive(Debug)]
struct Entry<R> {
    mode: LockMode,
    owner: Owner,
    generation: u64,
    /// Outstanding handles; the held-count is its length.
    tickets: Vec<u64>,
    resource: R,
}

impl<R> Entry<R> {
    fn held_count(&self) -> u32 {
        u32::try_from(self.tickets.len()).unwrap_or(u32::MAX)
    }

    fn issue(&mut self, path: &Path, deadline: Option<Instant>) -> LockHandle {
        let ticket = next_id();
        self.tickets.push(ticket);
        LockHandle::new(
            path.to_path_buf(),
            self.mode,
            self.held_count(),
            self.owner,
            deadline,
            self.generation,
            ticket,
        )
    }
}

/// Outcome of a single claim attempt against a per-path table.
#[derive(Debug)]
pub(crate) enum Claim {
    Held {
        handle: LockHandle,
        reentered: bool,
    },
    /// Another holder (another thread, or the OS on behalf of another process)
    /// prevents the claim right now.
    Busy,
}

#[derive(Debug)]
pub(crate) struct LockTable<R> {
    entries: Mutex<HashMap<PathBuf, Vec<Entry<R>>>>,
}

impl<R> Default for LockTable<R> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<R> LockTable<R> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<Entry<R>>>> {
        // A panic while holding the table cannot leave an entry half-written.
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Claim `path` for `owner`.
    ///
    /// Reentry by the same owner in the same mode is granted immediately.
    /// Other owners of the path make the claim busy unless every hold,
    /// including the requested one, is shared. Otherwise `try_acquire` is
    /// called while the table is locked; `Ok(None)` from it means the OS
    /// reported contention.
    pub(crate) fn claim<F>(
        &self,
        path: &Path,
        mode: LockMode,
        owner: Owner,
        deadline: Option<Instant>,
        try_acquire: F,
    ) -> Result<Claim>
    where
        F: FnOnce() -> Result<Option<R>>,
    {
        let mut entries = self.entries();
        let holders = entries.entry(path.to_path_buf()).or_default();

        if let Some(handle) = reenter(holders, path, mode, owner, deadline)? {
            return Ok(Claim::Held {
                handle,
                reentered: true,
            });
        }

        // Readers of other threads coexist, each on its own OS lock.
        let compatible = mode == LockMode::Shared
            && holders.iter().all(|e| e.mode == LockMode::Shared);
        if !holders.is_empty() && !compatible {
            return Ok(Claim::Busy);
        }

        let resource = match try_acquire() {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                if holders.is_empty() {
                    entries.remove(path);
                }
                return Ok(Claim::Busy);
            }
            Err(err) => {
                if holders.is_empty() {
                    entries.remove(path);
                }
                return Err(err);
            }
        };

        let mut entry = Entry {
            mode,
            owner,
            generation: next_id(),
            tickets: Vec::new(),
            resource,
        };
        let handle = entry.issue(path, deadline);
        holders.push(entry);

        Ok(Claim::Held {
            handle,
            reentered: false,
        })
    }

    /// Enter `path` for `owner` without ever contending with other owners.
    pub(crate) fn enter(
        &self,
        path: &Path,
        mode: LockMode,
        owner: Owner,
        deadline: Option<Instant>,
        resource: R,
    ) -> Result<LockHandle> {
        let mut entries = self.entries();
        let holders = entries.entry(path.to_path_buf()).or_default();

        if let Some(handle) = reenter(holders, path, mode, owner, deadline)? {
            return Ok(handle);
        }

        let mut entry = Entry {
            mode,
            owner,
            generation: next_id(),
            tickets: Vec::new(),
            resource,
        };
        let handle = entry.issue(path, deadline);
        holders.push(entry);
        Ok(handle)
    }

    /// Retire one outstanding handle.
    ///
    /// Returns the backing resource once the held-count reaches zero; the
    /// entry is gone from the table by then.
    pub(crate) fn release(&self, handle: &LockHandle) -> Result<Option<R>> {
        let mut entries = self.entries();
        let path = handle.path();
        let (holders, index) = locate(&mut entries, handle)?;

        let entry = &mut holders[index];
        entry.tickets.retain(|&t| t != handle.ticket());
        if !entry.tickets.is_empty() {
            return Ok(None);
        }

        let entry = holders.swap_remove(index);
        if holders.is_empty() {
            entries.remove(path);
        }
        Ok(Some(entry.resource))
    }

    /// Remove the entry behind `handle` so its mode can be changed.
    ///
    /// The handle must be the only outstanding hold and be in `expected` mode.
    pub(crate) fn take_sole(&self, handle: &LockHandle, expected: LockMode) -> Result<R> {
        let mut entries = self.entries();
        let path = handle.path();
        let (holders, index) = locate(&mut entries, handle)?;

        let entry = &holders[index];
        if entry.mode != expected {
            return Err(LockError::misuse(
                path,
                format!(
                    "handle holds a {} lock, expected {}",
                    entry.mode, expected
                ),
            ));
        }
        if entry.tickets.len() > 1 {
            return Err(LockError::misuse(
                path,
                format!(
                    "cannot change mode while {} nested acquisitions are outstanding",
                    entry.tickets.len()
                ),
            ));
        }

        let entry = holders.swap_remove(index);
        if holders.is_empty() {
            entries.remove(path);
        }
        Ok(entry.resource)
    }

    /// Mode `owner` currently holds on `path`.
    pub(crate) fn mode_of(&self, path: &Path, owner: Owner) -> LockMode {
        self.entries()
            .get(path)
            .and_then(|holders| holders.iter().find(|e| e.owner == owner))
            .map_or(LockMode::None, |e| e.mode)
    }

    /// Held-count of `owner` on `path`, zero when not held.
    pub(crate) fn held_count(&self, path: &Path, owner: Owner) -> u32 {
        self.entries()
            .get(path)
            .and_then(|holders| holders.iter().find(|e| e.owner == owner))
            .map_or(0, Entry::held_count)
    }

    /// Number of resources with at least one live entry.
    pub(crate) fn active(&self) -> usize {
        self.entries().len()
    }
}

/// Grant a nested acquisition if `owner` already holds `path` in `mode`.
fn reenter<R>(
    holders: &mut [Entry<R>],
    path: &Path,
    mode: LockMode,
    owner: Owner,
    deadline: Option<Instant>,
) -> Result<Option<LockHandle>> {
    let Some(entry) = holders.iter_mut().find(|e| e.owner == owner) else {
        return Ok(None);
    };

    if entry.mode != mode {
        let hint = if mode == LockMode::Exclusive {
            "upgrade"
        } else {
            "downgrade"
        };
        return Err(LockError::misuse(
            path,
            format!(
                "{} already holds a {} lock; request for {} requires an explicit {}",
                owner, entry.mode, mode, hint
            ),
        ));
    }

    Ok(Some(entry.issue(path, deadline)))
}

/// Find the live entry a handle refers to.
fn locate<'a, R>(
    entries: &'a mut HashMap<PathBuf, Vec<Entry<R>>>,
    handle: &LockHandle,
) -> Result<(&'a mut Vec<Entry<R>>, usize)> {
    let path = handle.path();
    let stale = || {
        LockError::misuse(
            path,
            "handle is no longer held (already released, or replaced by upgrade/downgrade)",
        )
    };

    let holders = entries.get_mut(path).ok_or_else(stale)?;
    let index = holders
        .iter()
        .position(|e| e.generation == handle.generation())
        .ok_or_else(stale)?;

    if !holders[index].tickets.contains(&handle.ticket()) {
        return Err(LockError::misuse(path, "handle was already released"));
    }

    Ok((holders, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("/prefix/.lock")
    }

    #[test]
    fn nested_claims_share_one_entry() {
        let table: LockTable<()> = LockTable::new();
        let owner = Owner::current();

        let first = table
            .enter(&path(), LockMode::Shared, owner, None, ())
            .unwrap();
        let second = table
            .enter(&path(), LockMode::Shared, owner, None, ())
            .unwrap();

        assert_eq!(first.held_count(), 1);
        assert_eq!(second.held_count(), 2);
        assert_eq!(table.held_count(&path(), owner), 2);
        assert_eq!(table.active(), 1);

        assert!(table.release(&second).unwrap().is_none());
        assert!(table.release(&first).unwrap().is_some());
        assert_eq!(table.active(), 0);
        assert_eq!(table.mode_of(&path(), owner), LockMode::None);
    }

    #[test]
    fn claim_reports_busy_for_other_owner() {
        let table: LockTable<()> = LockTable::new();
        let other = std::thread::spawn(Owner::current).join().unwrap();

        table
            .enter(&path(), LockMode::Exclusive, other, None, ())
            .unwrap();

        let claim = table
            .claim(&path(), LockMode::Shared, Owner::current(), None, || {
                panic!("must not touch the OS while another thread writes the path")
            })
            .unwrap();
        assert!(matches!(claim, Claim::Busy));
    }

    #[test]
    fn shared_claims_of_two_owners_coexist() {
        let table: LockTable<()> = LockTable::new();
        let other = std::thread::spawn(Owner::current).join().unwrap();
        let owner = Owner::current();

        table
            .enter(&path(), LockMode::Shared, other, None, ())
            .unwrap();

        let claim = table
            .claim(&path(), LockMode::Shared, owner, None, || Ok(Some(())))
            .unwrap();
        let Claim::Held { handle, reentered } = claim else {
            panic!("second reader must be granted");
        };
        assert!(!reentered);
        assert_eq!(handle.held_count(), 1);
        assert_eq!(table.mode_of(&path(), owner), LockMode::Shared);
        assert_eq!(table.mode_of(&path(), other), LockMode::Shared);

        let writer = std::thread::spawn(Owner::current).join().unwrap();
        let claim = table
            .claim(&path(), LockMode::Exclusive, writer, None, || {
                panic!("a writer must wait for both readers")
            })
            .unwrap();
        assert!(matches!(claim, Claim::Busy));

        // A contended OS attempt keeps the other owners' entries
        let third = std::thread::spawn(Owner::current).join().unwrap();
        let claim = table
            .claim(&path(), LockMode::Shared, third, None, || Ok(None))
            .unwrap();
        assert!(matches!(claim, Claim::Busy));
        assert_eq!(table.active(), 1);

        assert!(table.release(&handle).unwrap().is_some());
        assert_eq!(table.mode_of(&path(), other), LockMode::Shared);
    }

    #[test]
    fn failed_os_attempt_leaves_no_entry() {
        let table: LockTable<()> = LockTable::new();

        let claim = table
            .claim(&path(), LockMode::Exclusive, Owner::current(), None, || {
                Ok(None)
            })
            .unwrap();
        assert!(matches!(claim, Claim::Busy));
        assert_eq!(table.active(), 0);
    }

    #[test]
    fn take_sole_refuses_nested_holds() {
        let table: LockTable<()> = LockTable::new();
        let owner = Owner::current();
        let h1 = table
            .enter(&path(), LockMode::Shared, owner, None, ())
            .unwrap();
        let _h2 = table
            .enter(&path(), LockMode::Shared, owner, None, ())
            .unwrap();

        let err = table.take_sole(&h1, LockMode::Shared).unwrap_err();
        assert!(err.to_string().contains("nested acquisitions"));
        assert_eq!(table.held_count(&path(), owner), 2);
    }

    #[test]
    fn released_ticket_cannot_be_released_again() {
        let table: LockTable<()> = LockTable::new();
        let owner = Owner::current();
        let h1 = table
            .enter(&path(), LockMode::Exclusive, owner, None, ())
            .unwrap();
        let _h2 = table
            .enter(&path(), LockMode::Exclusive, owner, None, ())
            .unwrap();

        table.release(&h1).unwrap();
        let err = table.release(&h1).unwrap_err();
        assert!(matches!(err, LockError::Misuse { .. }));
        assert!(err.to_string().contains("already released"));
    }
}
