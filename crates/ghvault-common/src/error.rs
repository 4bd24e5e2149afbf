//! Error types for ghvault

use thiserror::Error;

/// Result type alias for ghvault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Main error type for ghvault
#[derive(Error, Debug)]
pub enum VaultError {
    /// Network or API failure talking to GitHub, git or Glacier.
    /// Contained to the item being processed; a later run retries it.
    #[error("Provider error during {operation}: {message}")]
    Provider { operation: String, message: String },

    /// Size or checksum mismatch while finalizing or verifying an archive
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// The progress file could not be written
    #[error("Failed to persist progress to '{path}': {message}")]
    Persistence { path: String, message: String },

    /// Missing or invalid settings, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Create a provider error for the named operation
    pub fn provider(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
