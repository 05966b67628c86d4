//! Core configuration.
//!
//! Loaded from a TOML file with `CORVID_` environment variable overrides.

mod loader;
mod types;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{CleanupConfig, Config, FetcherConfig, SchedulerConfig};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
