//! Two-stage archive pipeline
//!
//! ```text
//! items ──► [package stage] ──► [upload stage]
//!   │             fetch + zip        chunked upload
//!   └──────── already packaged ───────────┘
//! ```
//!
//! One worker per stage, each fed by a bounded queue sized to the batch. Items
//! already uploaded are skipped; items already packaged go straight to the
//! upload stage while their package is still on disk. Every transition is persisted before the item moves on, so a
//! later run resumes where this one stopped.

mod stages;

pub use stages::{PackageStage, UploadStage};

use crate::audit::AuditLogger;
use crate::item::{archive_description, Item, QueueEntry};
use crate::layout::RunLayout;
use crate::package::Packager;
use crate::progress::{ProgressStore, Stage};
use crate::source::Fetcher;
use crate::upload::ChunkedUploader;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Counts of what a run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub seen: usize,
    pub skipped_uploaded: usize,
    pub skipped_archived: usize,
    pub fetched: usize,
    pub packaged: usize,
    pub uploaded: usize,
    pub fetch_failed: usize,
    pub package_failed: usize,
    pub upload_failed: usize,
    /// Bytes of the packages uploaded by this run
    pub uploaded_bytes: u64,
    /// Stage workers that terminated abnormally; their items are not counted
    pub stages_crashed: usize,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.fetch_failed + self.package_failed + self.upload_failed
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.stages_crashed == 0
    }

    fn merge(&mut self, other: RunSummary) {
        self.fetched += other.fetched;
        self.packaged += other.packaged;
        self.uploaded += other.uploaded;
        self.fetch_failed += other.fetch_failed;
        self.package_failed += other.package_failed;
        self.upload_failed += other.upload_failed;
        self.uploaded_bytes += other.uploaded_bytes;
        self.stages_crashed += other.stages_crashed;
    }
}

/// Collaborators and shared state of a run
pub struct Pipeline {
    layout: RunLayout,
    progress: Arc<ProgressStore>,
    audit: Arc<dyn AuditLogger>,
    fetcher: Arc<dyn Fetcher>,
    packager: Arc<dyn Packager>,
    uploader: Arc<ChunkedUploader>,
    skip_archived: bool,
}

impl Pipeline {
    pub fn new(
        layout: RunLayout,
        progress: Arc<ProgressStore>,
        audit: Arc<dyn AuditLogger>,
        fetcher: Arc<dyn Fetcher>,
        packager: Arc<dyn Packager>,
        uploader: Arc<ChunkedUploader>,
    ) -> Self {
        Self {
            layout,
            progress,
            audit,
            fetcher,
            packager,
            uploader,
            skip_archived: false,
        }
    }

    /// Leave repositories archived upstream out of the run
    pub fn skip_archived(mut self, skip: bool) -> Self {
        self.skip_archived = skip;
        self
    }

    /// Push `items` through both stages and wait for them to drain
    #[instrument(skip_all, fields(date = %self.layout.date(), items = items.len()))]
    pub async fn run(&self, items: Vec<Item>) -> RunSummary {
        let capacity = items.len().max(1);
        let (package_tx, package_rx) = mpsc::channel::<QueueEntry>(capacity);
        let (upload_tx, upload_rx) = mpsc::channel::<QueueEntry>(capacity);

        let package_stage = PackageStage {
            layout: self.layout.clone(),
            progress: Arc::clone(&self.progress),
            audit: Arc::clone(&self.audit),
            fetcher: Arc::clone(&self.fetcher),
            packager: Arc::clone(&self.packager),
        };
        let upload_stage = UploadStage {
            layout: self.layout.clone(),
            progress: Arc::clone(&self.progress),
            audit: Arc::clone(&self.audit),
            uploader: Arc::clone(&self.uploader),
        };

        let package_handle = tokio::spawn(package_stage.run(package_rx, upload_tx.clone()));
        let upload_handle = tokio::spawn(upload_stage.run(upload_rx));

        let mut summary = RunSummary {
            seen: items.len(),
            ..RunSummary::default()
        };

        for item in items {
            let record = self.progress.get(&item.name);

            if record.has(Stage::Uploaded) {
                debug!(item = %item.name, "Already uploaded, skipping");
                summary.skipped_uploaded += 1;
                continue;
            }

            if self.skip_archived && item.archived {
                info!(item = %item.name, "Archived upstream, skipping");
                summary.skipped_archived += 1;
                continue;
            }

            let description = archive_description(self.layout.date(), &item.name);
            let entry = QueueEntry::new(Arc::new(item), description);

            let queue = if !record.has(Stage::Packaged) {
                &package_tx
            } else if self.layout.package_path(entry.name()).is_file() {
                &upload_tx
            } else {
                warn!(item = %entry.name(), "Package missing, packaging again");
                &package_tx
            };

            if let Err(rejected) = queue.send(entry).await {
                error!(item = %rejected.0.name(), "Stage stopped before the item could be queued");
            }
        }

        // Only the package stage's sender keeps the upload queue open now
        drop(package_tx);
        drop(upload_tx);

        summary.merge(join_stage("package", package_handle).await);
        summary.merge(join_stage("upload", upload_handle).await);

        info!(
            uploaded = summary.uploaded,
            failed = summary.failed(),
            skipped = summary.skipped_uploaded + summary.skipped_archived,
            "Run finished"
        );

        summary
    }
}

async fn join_stage(stage: &str, handle: JoinHandle<RunSummary>) -> RunSummary {
    match handle.await {
        Ok(summary) => summary,
        Err(e) => {
            error!(stage, error = %e, "Stage worker terminated abnormally");
            RunSummary {
                stages_crashed: 1,
                ..RunSummary::default()
            }
        },
    }
}
