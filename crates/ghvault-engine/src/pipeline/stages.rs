//! The two pipeline workers
//!
//! Each stage owns its receiver (and, for the package stage, the only stage
//! sender besides the orchestrator's). Dropping the stage future closes the
//! downstream queue, whether it returns normally or unwinds.

use super::RunSummary;
use crate::audit::{AuditEntry, AuditLogger};
use crate::item::QueueEntry;
use crate::layout::RunLayout;
use crate::package::Packager;
use crate::progress::{ProgressStore, Stage};
use crate::source::Fetcher;
use crate::upload::ChunkedUploader;
use ghvault_common::{Result, VaultError};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{error, info, warn};

/// Fetches (when needed) and packages items, then hands them to the upload stage
pub struct PackageStage {
    pub layout: RunLayout,
    pub progress: Arc<ProgressStore>,
    pub audit: Arc<dyn AuditLogger>,
    pub fetcher: Arc<dyn Fetcher>,
    pub packager: Arc<dyn Packager>,
}

impl PackageStage {
    pub async fn run(self, mut rx: Receiver<QueueEntry>, tx: Sender<QueueEntry>) -> RunSummary {
        let mut summary = RunSummary::default();

        while let Some(entry) = rx.recv().await {
            let size = match self.process(&entry, &mut summary).await {
                Ok(size) => size,
                Err(e) => {
                    error!(item = %entry.name(), error = %e, "Packaging failed, item dropped");
                    record_audit(self.audit.as_ref(), &AuditEntry::failure(&entry.description, &e));
                    continue;
                },
            };

            if tx.send(entry.with_packaged_size(size)).await.is_err() {
                warn!("Upload stage stopped, packaged item not forwarded");
            }
        }

        summary
    }

    /// Returns the size of the package
    async fn process(&self, entry: &QueueEntry, summary: &mut RunSummary) -> Result<u64> {
        let name = entry.name();
        let fetch_path = self.layout.fetch_path(name);
        let record = self.progress.get(name);

        let needs_fetch = if !record.fetched {
            true
        } else if !fetch_path.is_dir() {
            warn!(item = %name, "Fetched copy missing, fetching again");
            true
        } else {
            false
        };

        if needs_fetch {
            remove_dir_if_present(&fetch_path).await;

            info!(item = %name, "Fetching");
            if let Err(e) = self.fetcher.fetch(&entry.item, &fetch_path).await {
                summary.fetch_failed += 1;
                return Err(e);
            }

            self.progress.advance(name, Stage::Fetched);
            summary.fetched += 1;
        }

        let package_path = self.layout.package_path(name);
        info!(item = %name, "Packaging");

        let size = match self.packager.package(&fetch_path, &package_path).await {
            Ok(size) => size,
            Err(e) => {
                summary.package_failed += 1;
                return Err(e);
            },
        };

        remove_dir_if_present(&fetch_path).await;
        self.progress.advance(name, Stage::Packaged);
        summary.packaged += 1;

        info!(item = %name, size, "Packaged");
        Ok(size)
    }
}

/// Uploads packaged items and removes the local package
pub struct UploadStage {
    pub layout: RunLayout,
    pub progress: Arc<ProgressStore>,
    pub audit: Arc<dyn AuditLogger>,
    pub uploader: Arc<ChunkedUploader>,
}

impl UploadStage {
    pub async fn run(self, mut rx: Receiver<QueueEntry>) -> RunSummary {
        let mut summary = RunSummary::default();

        while let Some(entry) = rx.recv().await {
            let name = entry.name();
            let package_path = self.layout.package_path(name);

            match self.upload(&package_path, &entry).await {
                Ok((archive_id, size)) => {
                    if let Err(e) = tokio::fs::remove_file(&package_path).await {
                        warn!(item = %name, error = %e, "Failed to remove uploaded package");
                    }

                    self.progress.advance(name, Stage::Uploaded);
                    record_audit(self.audit.as_ref(), &AuditEntry::success(&archive_id, &entry.description));
                    summary.uploaded += 1;
                    summary.uploaded_bytes += size;

                    info!(item = %name, archive_id = %archive_id, size, "Uploaded");
                },
                Err(e) => {
                    error!(item = %name, error = %e, "Upload failed");
                    record_audit(self.audit.as_ref(), &AuditEntry::failure(&entry.description, &e));
                    summary.upload_failed += 1;
                },
            }
        }

        summary
    }

    /// Returns the archive id and the number of bytes uploaded
    async fn upload(&self, package_path: &Path, entry: &QueueEntry) -> Result<(String, u64)> {
        let mut file = tokio::fs::File::open(package_path).await?;
        let size = file.metadata().await?.len();

        if let Some(expected) = entry.packaged_size {
            if expected != size {
                return Err(VaultError::integrity(format!(
                    "{} is {} bytes, packaged as {}",
                    package_path.display(),
                    size,
                    expected
                )));
            }
        }

        info!(package = %package_path.display(), size, "Uploading");
        let archive_id = self.uploader.upload(&mut file, size, &entry.description).await?;
        Ok((archive_id, size))
    }
}

fn record_audit(audit: &dyn AuditLogger, entry: &AuditEntry) {
    if let Err(e) = audit.record(entry) {
        warn!(error = %e, description = %entry.description, "Failed to write audit log");
    }
}

async fn remove_dir_if_present(path: &Path) {
    if path.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove directory");
        }
    }
}
