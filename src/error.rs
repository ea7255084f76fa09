//! Error handling module for hydrocal
//!
//! Provides centralized error types using thiserror. Library code returns
//! [`Result`]; the binary wraps these in `anyhow` at the CLI boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hydrocal
#[derive(Error, Debug)]
pub enum HydroCalError {
    /// IO errors (configuration file, results directories, engine pipes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing configuration file does not exist
    #[error("Configuration file {} not found!", .0.display())]
    ConfigNotFound(PathBuf),

    /// Configuration errors (malformed file, unusable values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation parameters that could not be resolved or are unusable
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failures reported by (or while talking to) the external engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// The engine answered with something the bridge cannot interpret
    #[error("Engine protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for hydrocal operations
pub type Result<T> = std::result::Result<T, HydroCalError>;

impl HydroCalError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error was raised before any engine session was started.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
