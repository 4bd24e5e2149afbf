//! ghvault engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Resumable archiving of a GitHub organisation to AWS Glacier, and retrieval
//! of archived repositories.
//!
//! # Architecture
//!
//! ```text
//! GitHubLister ─► Pipeline ─► PackageStage (GitFetcher + ZipPackager)
//!                     │              │
//!                     │              ▼
//!                     └────────► UploadStage (ChunkedUploader ─► ColdStorage)
//!
//! ProgressStore: per-item fetched / packaged / uploaded, persisted per transition
//! AuditLogger:   one line per archived or failed item
//! Retriever:     retrieval job + CompletionWaiter + verified download
//! ```
//!
//! Every collaborator sits behind a trait (`ItemLister`, `Fetcher`, `Packager`,
//! `ColdStorage`, `AuditLogger`) so the pipeline runs against in-memory doubles
//! in tests.

pub mod audit;
pub mod config;
pub mod item;
pub mod layout;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod retrieval;
pub mod source;
pub mod storage;
pub mod upload;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support;

pub use audit::{AuditEntry, AuditLogger, FileAuditLogger};
pub use config::{Config, Purpose};
pub use item::{Item, QueueEntry};
pub use layout::RunLayout;
pub use package::{Packager, ZipPackager};
pub use pipeline::{Pipeline, RunSummary};
pub use progress::{ProgressRecord, ProgressStore, Stage};
pub use retrieval::{CompletionWaiter, RestoreReport, Retriever};
pub use source::{Fetcher, GitFetcher, GitHubLister, ItemLister};
pub use storage::{ColdStorage, GlacierStorage};
pub use upload::{ChunkedUploader, UploadConfig};
