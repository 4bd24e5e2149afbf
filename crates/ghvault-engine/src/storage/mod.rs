//! Cold storage abstraction
//!
//! [`ColdStorage`] covers the vault operations the pipeline and the retrieval
//! path need. [`GlacierStorage`] talks to AWS Glacier; tests substitute an
//! in-memory implementation.

use async_trait::async_trait;
use ghvault_common::Result;
use std::pin::Pin;
use tokio::io::AsyncRead;

pub mod glacier;

pub use glacier::GlacierStorage;

/// Half-open byte range `[start, end)` of one multipart part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Wire form: inclusive end, unknown total (`bytes 0-1023/*`)
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/*", self.start, self.end.saturating_sub(1))
    }
}

/// Status of a vault job as reported by the job listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: String,
    pub completed: bool,
}

/// Payload of a completed retrieval job
pub struct JobOutput {
    pub body: Pin<Box<dyn AsyncRead + Send>>,
    /// Tree hash of the payload, when the provider reports one
    pub checksum: Option<String>,
}

/// Trait for cold storage operations (allows mocking for tests)
///
/// Implementations are bound to a single vault.
#[async_trait]
pub trait ColdStorage: Send + Sync {
    /// Create the vault; succeeds when it already exists
    async fn create_vault(&self) -> Result<()>;

    /// Single-request upload; returns the archive id
    async fn upload_archive(
        &self,
        body: Vec<u8>,
        description: &str,
        checksum: &str,
    ) -> Result<String>;

    /// Open a multipart session; returns the upload id
    async fn initiate_multipart_upload(&self, description: &str, part_size: u64)
        -> Result<String>;

    async fn upload_part(
        &self,
        upload_id: &str,
        range: ByteRange,
        body: Vec<u8>,
        checksum: &str,
    ) -> Result<()>;

    /// Finalize a multipart session; returns the archive id
    async fn complete_multipart_upload(
        &self,
        upload_id: &str,
        archive_size: u64,
        checksum: &str,
    ) -> Result<String>;

    async fn abort_multipart_upload(&self, upload_id: &str) -> Result<()>;

    /// Request an archive retrieval; returns the job id
    async fn initiate_retrieval_job(&self, archive_id: &str) -> Result<String>;

    /// All jobs of the vault, across every page
    async fn list_jobs(&self) -> Result<Vec<JobSummary>>;

    async fn fetch_job_output(&self, job_id: &str) -> Result<JobOutput>;
}
