//! Error types for the ghvault CLI
//!
//! Each variant maps to a process exit code so scripts can tell a broken
//! configuration from an unreachable GitHub or AWS.

use ghvault_common::VaultError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check .ghvault.toml and the GHVAULT_* environment variables.")]
    Config(String),

    /// GitHub could not be listed
    #[error("GitHub error: {0}. Check the organisation name and token permissions.")]
    GitHub(String),

    /// Glacier rejected a request or returned bad data
    #[error("AWS error: {0}. Check the AWS credentials, region and vault name.")]
    Aws(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify an engine error raised while loading settings
    pub fn settings(err: VaultError) -> Self {
        match err {
            VaultError::Config(msg) => Self::Config(msg),
            other => Self::Config(other.to_string()),
        }
    }

    /// Classify an engine error raised while talking to GitHub
    pub fn github(err: VaultError) -> Self {
        match err {
            VaultError::Config(msg) => Self::Config(msg),
            other => Self::GitHub(other.to_string()),
        }
    }

    /// Classify an engine error raised while talking to Glacier
    pub fn aws(err: VaultError) -> Self {
        match err {
            VaultError::Config(msg) => Self::Config(msg),
            VaultError::Io(e) => Self::Io(e),
            other => Self::Aws(other.to_string()),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Io(_) => 1,
            Self::GitHub(_) => 2,
            Self::Aws(_) => 3,
        }
    }
}
