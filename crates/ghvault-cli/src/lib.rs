//! ghvault CLI Library
//!
//! Command-line interface for archiving a GitHub organisation to AWS Glacier.
//!
//! # Overview
//!
//! - **Backup**: archive every repository of the organisation (`ghvault backup`)
//! - **Restore**: retrieve one archive back to disk (`ghvault restore`)
//!
//! Interrupted backups are resumed by running the same command again with the
//! same run date (`--date`).
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Configuration failure |
//! | 2 | GitHub failure |
//! | 3 | AWS failure |

pub mod commands;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ghvault - GitHub organisation backups to AWS Glacier
#[derive(Parser, Debug)]
#[command(name = "ghvault")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./.ghvault.toml)
    #[arg(short, long, env = "GHVAULT_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive every repository of the organisation, resuming an earlier run
    Backup {
        /// Run date to use instead of today (resumes that day's run)
        #[arg(short, long)]
        date: Option<String>,

        /// Skip repositories archived on GitHub
        #[arg(long)]
        skip_archived: bool,
    },

    /// Retrieve an archive from the vault (waits for the retrieval job)
    Restore {
        /// Archive id, as recorded in the audit log
        archive_id: String,

        /// Where to write the retrieved archive
        #[arg(short, long, default_value = "output.zip")]
        output: PathBuf,

        /// Date of the backup run the archive belongs to (selects the vault)
        #[arg(short, long)]
        date: Option<String>,
    },
}
