//! Error types for buildlock.
//!
//! Uses thiserror for derive macros. Every variant maps to an exit code so the
//! CLI can report lock failures to build scripts without parsing messages.

use crate::exit_codes;
use crate::locks::LockMode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The requested mode could not be obtained before the deadline.
    ///
    /// Nothing is held as a result of the failed call.
    #[error(
        "timed out after {waited:?} waiting for {mode} lock on '{}' ({attempts} attempt(s))",
        path.display()
    )]
    Timeout {
        path: PathBuf,
        mode: LockMode,
        waited: Duration,
        attempts: u32,
    },

    /// The shared lock was released but the exclusive one could not be taken.
    #[error(
        "upgrade of '{}' to exclusive failed, no lock is held anymore: {source}",
        path.display()
    )]
    Upgrade {
        path: PathBuf,
        #[source]
        source: Box<LockError>,
    },

    /// The exclusive lock was released but the shared one could not be taken.
    #[error(
        "downgrade of '{}' to shared failed, no lock is held anymore: {source}",
        path.display()
    )]
    Downgrade {
        path: PathBuf,
        #[source]
        source: Box<LockError>,
    },

    /// The lock file or its parent directories could not be prepared or locked.
    #[error("lock i/o error on '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A handle was used in a way the lock contract forbids.
    #[error("lock misuse on '{}': {reason}", path.display())]
    Misuse { path: PathBuf, reason: String },

    /// Configuration could not be loaded or failed validation.
    #[error("{0}")]
    Config(String),

    /// A report could not be rendered as JSON.
    #[error("failed to render report: {0}")]
    Report(#[source] serde_json::Error),

    /// A command run under a lock could not be started.
    #[error("failed to run '{program}': {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Timeout { .. } => exit_codes::LOCK_FAILURE,
            LockError::Upgrade { .. } | LockError::Downgrade { .. } => {
                exit_codes::TRANSITION_FAILURE
            }
            LockError::Filesystem { .. } => exit_codes::FILESYSTEM_FAILURE,
            LockError::Misuse { .. } | LockError::Config(_) | LockError::Command { .. } => {
                exit_codes::USER_ERROR
            }
            LockError::Report(_) => exit_codes::INTERNAL_ERROR,
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Timeout { .. } | LockError::Upgrade { .. })
    }

    pub(crate) fn misuse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LockError::Misuse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LockError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
