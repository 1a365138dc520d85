//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no entry specified")]
    NoEntry,

    #[error("invalid output filename '{0}': {1}")]
    InvalidFilename(String, &'static str),

    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
