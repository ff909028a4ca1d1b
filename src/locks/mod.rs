//! Locking subsystem for buildlock.
//!
//! Concurrent build workers mutate shared install prefixes and metadata
//! stores. Every such mutation happens under a lock on a path-addressed
//! resource, taken through a [`LockStrategy`]:
//! - [`FileLock`]: OS advisory locks on a zero-length lock file
//! - [`NullLock`]: no coordination, same contract
//!
//! # Lock Files
//!
//! The resource path is the lock file. It is created, along with missing
//! parent directories, on the first acquisition attempt and is never read,
//! written, or removed afterwards.
//!
//! # Reentrancy
//!
//! Each strategy instance keeps a private lock table. Re-acquiring the mode
//! the calling thread already holds increments a held-count; the OS lock is
//! released when the matching number of releases has been made.
//!
//! # RAII Guards
//!
//! [`LockGuard`] releases its acquisition when dropped. If the release fails
//! during drop, a warning is logged but the program does not crash.

mod file;
mod guard;
mod handle;
mod null;
mod poll;
mod strategy;
mod table;
mod types;


// Re-export public API
pub use file::FileLock;
pub use guard::LockGuard;
pub use handle::LockHandle;
pub use null::NullLock;
pub use poll::PollSettings;
pub use strategy::LockStrategy;
pub use types::{LockMode, Owner, StrategyKind};
