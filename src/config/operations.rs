//! Config loading, validation, and environment overrides.

use super::model::Config;
use crate::error::{LockError, Result};
use crate::locks::StrategyKind;
use std::path::Path;

/// Environment variable selecting the strategy (`file`/`null`, or a boolean).
pub const ENV_LOCKING: &str = "BUILDLOCK_LOCKING";

/// Environment variable overriding the default timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "BUILDLOCK_TIMEOUT_SECS";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// The lookup is injected so callers decide where values come from;
    /// `std::env::var` in the binary, a map in tests.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_LOCKING) {
            self.locking = StrategyKind::from_str(&value).ok_or_else(|| {
                LockError::Config(format!(
                    "{} must be 'file' or 'null' (found '{}')",
                    ENV_LOCKING, value
                ))
            })?;
        }

        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.default_timeout_secs = value.trim().parse().map_err(|_| {
                LockError::Config(format!(
                    "{} must be a number of seconds (found '{}')",
                    ENV_TIMEOUT_SECS, value
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `default_timeout_secs` must be a finite, non-negative number
    /// - `poll_interval_ms` must be positive
    /// - `max_poll_interval_ms` must not be below `poll_interval_ms`
    pub fn validate(&self) -> Result<()> {
        if !self.default_timeout_secs.is_finite() || self.default_timeout_secs < 0.0 {
            return Err(LockError::Config(format!(
                "config validation failed: default_timeout_secs must be a non-negative number (found {})",
                self.default_timeout_secs
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(LockError::Config(format!(
                "config validation failed: max_poll_interval_ms ({}) must be at least poll_interval_ms ({})",
                self.max_poll_interval_ms, self.poll_interval_ms
            )));
        }

        Ok(())
    }
}
