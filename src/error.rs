//! Error types for pollwatch

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by configuration, lifecycle and dispatch
#[derive(Debug, Error)]
pub enum WatchError {
    /// Watched root is missing or not a directory
    #[error("Watch root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// Polling interval of zero
    #[error("Polling interval must be greater than 0")]
    InvalidInterval,

    /// A filter pattern failed to compile
    #[error("Invalid filter pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for `WatchConfig`
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Worker thread could not be spawned
    #[error("Failed to spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The event handler returned an error and the polling loop stopped
    #[error("Event handler failed: {0:#}")]
    Handler(anyhow::Error),

    /// The handler was lost when the polling thread panicked
    #[error("Event handler is unavailable after a polling thread panic")]
    HandlerUnavailable,
}

/// Result type alias for pollwatch operations
pub type Result<T> = std::result::Result<T, WatchError>;
