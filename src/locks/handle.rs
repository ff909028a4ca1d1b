//! Per-acquisition lock handle.

use super::types::{LockMode, Owner};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Token returned by a successful acquisition.
///
/// A handle is a receipt, not the lock itself: the underlying OS lock lives in
/// the strategy's lock table. A handle's mode never changes; `upgrade` and
/// `downgrade` hand out a new handle and invalidate the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    path: PathBuf,
    mode: LockMode,
    held_count: u32,
    owner: Owner,
    deadline: Option<Instant>,
    generation: u64,
    ticket: u64,
}

impl LockHandle {
    pub(crate) fn new(
        path: PathBuf,
        mode: LockMode,
        held_count: u32,
        owner: Owner,
        deadline: Option<Instant>,
        generation: u64,
        ticket: u64,
    ) -> Self {
        Self {
            path,
            mode,
            held_count,
            owner,
            deadline,
            generation,
            ticket,
        }
    }

    /// Path of the lock file identifying the resource.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Reentrancy depth at the moment this handle was handed out.
    pub fn held_count(&self) -> u32 {
        self.held_count
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Deadline that bounded the acquisition; `None` when it was unbounded.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether this handle came from a nested acquisition by the same owner.
    pub fn is_reentrant(&self) -> bool {
        self.held_count > 1
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.ticket
    }
}
