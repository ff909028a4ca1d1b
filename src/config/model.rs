//! Config struct definition and default implementation.

use crate::locks::{PollSettings, StrategyKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Locking configuration for a build run.
///
/// This struct represents the contents of a `buildlock.yaml` file.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Strategy selection
    // =========================================================================
    /// Which strategy every lock in the run uses (`file` or `null`).
    ///
    /// `null` is the only supported answer for filesystems without working
    /// advisory locks.
    #[serde(default)]
    pub locking: StrategyKind,

    // =========================================================================
    // Timing
    // =========================================================================
    /// Default acquisition timeout in seconds, used when a call passes none.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,

    /// First wait between acquisition attempts, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cap for the doubling wait between attempts, in milliseconds.
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    // =========================================================================
    // Paths
    // =========================================================================
    /// Directory that relative lock paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_root: Option<PathBuf>,
}

// Default value functions for serde
fn default_timeout_secs() -> f64 {
    60.0
}
fn default_poll_interval_ms() -> u64 {
    PollSettings::DEFAULT_INTERVAL.as_millis() as u64
}
fn default_max_poll_interval_ms() -> u64 {
    PollSettings::DEFAULT_MAX_INTERVAL.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locking: StrategyKind::default(),
            default_timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            lock_root: None,
        }
    }
}

impl Config {
    /// Default acquisition timeout. Values too large for `Duration` saturate,
    /// which makes waits effectively unbounded.
    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.max_poll_interval_ms),
        )
    }
}
