//! Lock mode, owner, and strategy kind definitions.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::thread::{self, ThreadId};

/// Mode in which a resource is (or is not) held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Not held by this process.
    None,
    /// Multi-reader mode; coexists with other shared holders.
    Shared,
    /// Single-writer mode; excludes every other holder.
    Exclusive,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::None => "none",
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (process, thread) pair that owns an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    pid: u32,
    thread: ThreadId,
}

impl Owner {
    /// Owner for the calling thread of the current process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            thread: thread::current().id(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} {:?}", self.pid, self.thread)
    }
}

/// Which lock strategy a context runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Real coordination through OS advisory locks (default).
    #[default]
    File,
    /// No coordination at all; every call succeeds immediately.
    Null,
}

impl StrategyKind {
    /// Parse a strategy kind from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "true" | "on" => Some(Self::File),
            "null" | "none" | "false" | "off" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::File => "file",
            StrategyKind::Null => "null",
        }
    }
}

/// Accepts `file`/`null` and YAML booleans (`locking: false` disables
/// coordination). A bare YAML `null` also selects the null strategy.
impl<'de> Deserialize<'de> for StrategyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Ok(StrategyKind::Null),
            Some(Raw::Flag(true)) => Ok(StrategyKind::File),
            Some(Raw::Name(name)) => StrategyKind::from_str(&name).ok_or_else(|| {
                D::Error::custom(format!(
                    "unknown locking strategy '{name}', expected 'file' or 'null'"
                ))
            }),
        }
    }
}
