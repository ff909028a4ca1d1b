//! Configuration model for buildlock.
//!
//! This module defines the Config struct that represents `buildlock.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, validation of config values, and
//! environment overrides applied once at startup.

mod model;
mod operations;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use operations::{ENV_LOCKING, ENV_TIMEOUT_SECS};
