//! ghvault Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging and checksum utilities for the ghvault workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`VaultError`] taxonomy and [`Result`] alias
//! - **Checksums**: Glacier SHA-256 tree hashes
//! - **Logging**: centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use ghvault_common::checksum::tree_hash;
//!
//! let checksum = tree_hash(b"hello world");
//! println!("Tree hash: {}", checksum);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, VaultError};
