//! Archive retrieval
//!
//! Retrieval jobs take hours to complete. [`CompletionWaiter`] polls the vault
//! job list at a fixed interval with no upper bound; callers that want a
//! deadline wrap the future in `tokio::time::timeout`.

use crate::storage::ColdStorage;
use ghvault_common::checksum::TreeHasher;
use ghvault_common::{Result, VaultError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Polls a job until the provider reports it complete
pub struct CompletionWaiter {
    storage: Arc<dyn ColdStorage>,
    interval: Duration,
}

impl CompletionWaiter {
    pub fn new(storage: Arc<dyn ColdStorage>, interval: Duration) -> Self {
        Self { storage, interval }
    }

    /// Wait for `job_id` to complete; returns the number of checks made
    ///
    /// Checks first, then sleeps the interval between checks. A provider error
    /// ends the wait.
    #[instrument(skip(self))]
    pub async fn await_completion(&self, job_id: &str) -> Result<u32> {
        let mut checks = 0;

        loop {
            checks += 1;

            let jobs = self.storage.list_jobs().await?;
            if jobs.iter().any(|job| job.job_id == job_id && job.completed) {
                info!(checks, "Job completed");
                return Ok(checks);
            }

            info!(
                checks,
                next_check_secs = self.interval.as_secs(),
                "Job still in progress"
            );
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Outcome of a restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub job_id: String,
    pub bytes: u64,
    pub checks: u32,
    /// Whether a provider checksum was available and matched
    pub verified: bool,
}

/// Brings an archive back to local disk
pub struct Retriever {
    storage: Arc<dyn ColdStorage>,
    waiter: CompletionWaiter,
}

impl Retriever {
    pub fn new(storage: Arc<dyn ColdStorage>, poll_interval: Duration) -> Self {
        Self {
            waiter: CompletionWaiter::new(Arc::clone(&storage), poll_interval),
            storage,
        }
    }

    /// Retrieve `archive_id` into `output`
    ///
    /// The output file is removed again if the download fails or its tree hash
    /// does not match the one reported by the provider.
    #[instrument(skip(self, output), fields(output = %output.display()))]
    pub async fn restore(&self, archive_id: &str, output: &Path) -> Result<RestoreReport> {
        let job_id = self.storage.initiate_retrieval_job(archive_id).await?;
        info!(job_id = %job_id, "Retrieval job started");

        let checks = self.waiter.await_completion(&job_id).await?;

        match self.download(&job_id, output).await {
            Ok((bytes, verified)) => {
                info!(bytes, verified, "Archive restored");
                Ok(RestoreReport {
                    job_id,
                    bytes,
                    checks,
                    verified,
                })
            },
            Err(e) => {
                if output.exists() {
                    if let Err(remove_err) = tokio::fs::remove_file(output).await {
                        warn!(error = %remove_err, "Failed to remove incomplete output");
                    }
                }
                Err(e)
            },
        }
    }

    async fn download(&self, job_id: &str, output: &Path) -> Result<(u64, bool)> {
        let mut job_output = self.storage.fetch_job_output(job_id).await?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(output).await?;

        let mut tree = TreeHasher::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        loop {
            let read = job_output.body.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            tree.update(&buffer[..read]);
            file.write_all(&buffer[..read]).await?;
        }

        file.flush().await?;

        let bytes = tree.total_len();
        let actual = tree.finalize_hex();

        match job_output.checksum {
            Some(expected) if expected != actual => Err(VaultError::integrity(format!(
                "downloaded archive hashes to {}, provider reported {}",
                actual, expected
            ))),
            Some(_) => Ok((bytes, true)),
            None => {
                debug!("Provider reported no checksum, skipping verification");
                Ok((bytes, false))
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{MockColdStorage, StorageCall};
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(300);

    async fn start_job(storage: &MockColdStorage, archive_id: &str) -> String {
        storage.initiate_retrieval_job(archive_id).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_third_check() {
        let storage = Arc::new(MockColdStorage::new().with_archive("arch-1", vec![1, 2, 3]));
        let job_id = start_job(&storage, "arch-1").await;
        storage.script_job_checks([false, false, true]);

        let waiter = CompletionWaiter::new(storage.clone(), INTERVAL);
        let started = Instant::now();

        let checks = waiter.await_completion(&job_id).await.unwrap();

        assert_eq!(checks, 3);
        assert_eq!(storage.list_count(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= 2 * INTERVAL && elapsed < 3 * INTERVAL, "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_returns_without_sleeping() {
        let storage = Arc::new(MockColdStorage::new().with_archive("arch-1", vec![1]));
        let job_id = start_job(&storage, "arch-1").await;

        let started = Instant::now();
        let checks = CompletionWaiter::new(storage, INTERVAL)
            .await_completion(&job_id)
            .await
            .unwrap();

        assert_eq!(checks, 1);
        assert!(started.elapsed() < INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_ends_wait() {
        let storage = Arc::new(MockColdStorage::new());
        storage.fail_list_jobs();

        let err = CompletionWaiter::new(storage, INTERVAL)
            .await_completion("job-1")
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::Provider { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_jobs_do_not_count() {
        let storage = Arc::new(MockColdStorage::new().with_archive("arch-1", vec![1]));
        start_job(&storage, "arch-1").await;

        let waiter = CompletionWaiter::new(storage, INTERVAL);
        let result = tokio::time::timeout(3 * INTERVAL, waiter.await_completion("job-unknown")).await;

        assert!(result.is_err(), "waiter should still be polling");
    }

    #[tokio::test]
    async fn test_restore_writes_verified_archive() {
        let data: Vec<u8> = (0..3_000_000u32).map(|i| (i % 255) as u8).collect();
        let storage = Arc::new(MockColdStorage::new().with_archive("arch-1", data.clone()));
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("restored").join("svc-a.zip");

        let report = Retriever::new(storage.clone(), INTERVAL)
            .restore("arch-1", &output)
            .await
            .unwrap();

        assert_eq!(report.bytes, data.len() as u64);
        assert_eq!(report.checks, 1);
        assert!(report.verified);
        assert_eq!(std::fs::read(&output).unwrap(), data);
        assert!(storage.calls().contains(&StorageCall::GetJobOutput {
            job_id: report.job_id.clone()
        }));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_removes_output() {
        let storage = Arc::new(MockColdStorage::new().with_archive("arch-1", vec![9; 1024]));
        storage.corrupt_output();
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.zip");

        let err = Retriever::new(storage, INTERVAL)
            .restore("arch-1", &output)
            .await
            .unwrap_err();

        assert!(matches!(err, VaultError::Integrity(_)));
        assert!(!output.exists());
    }
}
