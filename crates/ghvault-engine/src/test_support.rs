// Test doubles for the pipeline collaborators

use crate::item::Item;
use crate::package::Packager;
use crate::source::Fetcher;
use crate::storage::{ByteRange, ColdStorage, JobOutput, JobSummary};
use async_trait::async_trait;
use ghvault_common::checksum::{tree_hash, TreeHasher};
use ghvault_common::{Result, VaultError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One call received by [`MockColdStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    CreateVault,
    UploadArchive { description: String, size: u64 },
    InitiateMultipart { description: String, part_size: u64 },
    UploadPart { upload_id: String, range: ByteRange },
    CompleteMultipart { upload_id: String, archive_size: u64 },
    AbortMultipart { upload_id: String },
    InitiateJob { archive_id: String },
    ListJobs,
    GetJobOutput { job_id: String },
}

/// An archive held by the mock vault
#[derive(Debug, Clone)]
pub struct StoredArchive {
    pub description: String,
    pub size: u64,
    pub checksum: String,
    /// Kept for single-request uploads only
    pub data: Option<Vec<u8>>,
}

struct PendingUpload {
    description: String,
    received: u64,
    parts: usize,
    tree: TreeHasher,
}

#[derive(Default)]
struct MockState {
    calls: Vec<StorageCall>,
    archives: HashMap<String, StoredArchive>,
    pending: HashMap<String, PendingUpload>,
    stored_parts: Vec<ByteRange>,
    jobs: HashMap<String, String>,
    job_script: VecDeque<bool>,
    fail_part: Option<usize>,
    fail_complete: bool,
    fail_list_jobs: bool,
    corrupt_output: bool,
    fail_descriptions: HashSet<String>,
}

/// In-memory vault
///
/// Verifies part ranges and checksums the way the real service does, so a
/// protocol mistake surfaces as an error in tests.
#[derive(Default)]
pub struct MockColdStorage {
    state: Mutex<MockState>,
    next_id: AtomicUsize,
}

impl MockColdStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Fail the part with this zero-based index of every multipart upload
    pub fn fail_part(&self, index: usize) {
        self.state().fail_part = Some(index);
    }

    pub fn fail_complete(&self) {
        self.state().fail_complete = true;
    }

    pub fn fail_list_jobs(&self) {
        self.state().fail_list_jobs = true;
    }

    /// Report a wrong checksum with job output
    pub fn corrupt_output(&self) {
        self.state().corrupt_output = true;
    }

    /// Reject uploads whose description ends with `suffix`
    pub fn fail_uploads_of(&self, suffix: &str) {
        self.state().fail_descriptions.insert(suffix.to_string());
    }

    /// Completion status returned by successive job listings; `true` once exhausted
    pub fn script_job_checks(&self, checks: impl IntoIterator<Item = bool>) {
        self.state().job_script = checks.into_iter().collect();
    }

    pub fn with_archive(self, archive_id: &str, data: Vec<u8>) -> Self {
        let archive = StoredArchive {
            description: String::new(),
            size: data.len() as u64,
            checksum: tree_hash(&data),
            data: Some(data),
        };
        self.state().archives.insert(archive_id.to_string(), archive);
        self
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.state().calls.clone()
    }

    pub fn archives(&self) -> Vec<StoredArchive> {
        self.state().archives.values().cloned().collect()
    }

    pub fn archive_data(&self, archive_id: &str) -> Option<Vec<u8>> {
        self.state()
            .archives
            .get(archive_id)
            .and_then(|a| a.data.clone())
    }

    pub fn completed_checksum(&self, archive_id: &str) -> Option<String> {
        self.state().archives.get(archive_id).map(|a| a.checksum.clone())
    }

    /// Ranges of the parts that were accepted
    pub fn part_ranges(&self) -> Vec<ByteRange> {
        self.state().stored_parts.clone()
    }

    fn count(&self, pred: impl Fn(&StorageCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn abort_count(&self) -> usize {
        self.count(|c| matches!(c, StorageCall::AbortMultipart { .. }))
    }

    pub fn complete_count(&self) -> usize {
        self.count(|c| matches!(c, StorageCall::CompleteMultipart { .. }))
    }

    pub fn list_count(&self) -> usize {
        self.count(|c| matches!(c, StorageCall::ListJobs))
    }

    /// Uploads started, single-request or multipart
    pub fn upload_count(&self) -> usize {
        self.count(|c| {
            matches!(
                c,
                StorageCall::UploadArchive { .. } | StorageCall::InitiateMultipart { .. }
            )
        })
    }
}

fn rejected(state: &MockState, description: &str) -> bool {
    state
        .fail_descriptions
        .iter()
        .any(|suffix| description.ends_with(suffix.as_str()))
}

#[async_trait]
impl ColdStorage for MockColdStorage {
    async fn create_vault(&self) -> Result<()> {
        self.state().calls.push(StorageCall::CreateVault);
        Ok(())
    }

    async fn upload_archive(&self, body: Vec<u8>, description: &str, checksum: &str) -> Result<String> {
        let archive_id = self.next_id("archive");
        let mut state = self.state();
        state.calls.push(StorageCall::UploadArchive {
            description: description.to_string(),
            size: body.len() as u64,
        });

        if rejected(&state, description) {
            return Err(VaultError::provider("upload archive", "service unavailable"));
        }
        if tree_hash(&body) != checksum {
            return Err(VaultError::integrity("archive checksum mismatch"));
        }

        state.archives.insert(
            archive_id.clone(),
            StoredArchive {
                description: description.to_string(),
                size: body.len() as u64,
                checksum: checksum.to_string(),
                data: Some(body),
            },
        );
        Ok(archive_id)
    }

    async fn initiate_multipart_upload(&self, description: &str, part_size: u64) -> Result<String> {
        let upload_id = self.next_id("upload");
        let mut state = self.state();
        state.calls.push(StorageCall::InitiateMultipart {
            description: description.to_string(),
            part_size,
        });

        if rejected(&state, description) {
            return Err(VaultError::provider("initiate multipart upload", "service unavailable"));
        }

        state.pending.insert(
            upload_id.clone(),
            PendingUpload {
                description: description.to_string(),
                received: 0,
                parts: 0,
                tree: TreeHasher::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(&self, upload_id: &str, range: ByteRange, body: Vec<u8>, checksum: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(StorageCall::UploadPart {
            upload_id: upload_id.to_string(),
            range,
        });

        let fail_part = state.fail_part;
        let pending = state
            .pending
            .get_mut(upload_id)
            .ok_or_else(|| VaultError::provider("upload part", "unknown upload id"))?;

        if fail_part == Some(pending.parts) {
            return Err(VaultError::provider("upload part", "connection reset"));
        }
        if range.start != pending.received || range.len() != body.len() as u64 {
            return Err(VaultError::integrity("part range does not follow the previous part"));
        }
        if tree_hash(&body) != checksum {
            return Err(VaultError::integrity("part checksum mismatch"));
        }

        pending.tree.update(&body);
        pending.received = range.end;
        pending.parts += 1;
        state.stored_parts.push(range);
        Ok(())
    }

    async fn complete_multipart_upload(&self, upload_id: &str, archive_size: u64, checksum: &str) -> Result<String> {
        let archive_id = self.next_id("archive");
        let mut state = self.state();
        state.calls.push(StorageCall::CompleteMultipart {
            upload_id: upload_id.to_string(),
            archive_size,
        });

        if state.fail_complete {
            return Err(VaultError::provider("complete multipart upload", "internal error"));
        }

        let pending = state
            .pending
            .remove(upload_id)
            .ok_or_else(|| VaultError::provider("complete multipart upload", "unknown upload id"))?;

        if pending.received != archive_size {
            return Err(VaultError::integrity("archive size mismatch"));
        }
        if pending.tree.finalize_hex() != checksum {
            return Err(VaultError::integrity("archive checksum mismatch"));
        }

        state.archives.insert(
            archive_id.clone(),
            StoredArchive {
                description: pending.description,
                size: archive_size,
                checksum: checksum.to_string(),
                data: None,
            },
        );
        Ok(archive_id)
    }

    async fn abort_multipart_upload(&self, upload_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(StorageCall::AbortMultipart {
            upload_id: upload_id.to_string(),
        });
        state.pending.remove(upload_id);
        Ok(())
    }

    async fn initiate_retrieval_job(&self, archive_id: &str) -> Result<String> {
        let job_id = self.next_id("job");
        let mut state = self.state();
        state.calls.push(StorageCall::InitiateJob {
            archive_id: archive_id.to_string(),
        });

        if !state.archives.contains_key(archive_id) {
            return Err(VaultError::provider("initiate retrieval job", "archive not found"));
        }

        state.jobs.insert(job_id.clone(), archive_id.to_string());
        Ok(job_id)
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let mut state = self.state();
        state.calls.push(StorageCall::ListJobs);

        if state.fail_list_jobs {
            return Err(VaultError::provider("list jobs", "throttled"));
        }

        let completed = state.job_script.pop_front().unwrap_or(true);
        Ok(state
            .jobs
            .keys()
            .map(|job_id| JobSummary {
                job_id: job_id.clone(),
                completed,
            })
            .collect())
    }

    async fn fetch_job_output(&self, job_id: &str) -> Result<JobOutput> {
        let mut state = self.state();
        state.calls.push(StorageCall::GetJobOutput {
            job_id: job_id.to_string(),
        });

        let archive = state
            .jobs
            .get(job_id)
            .and_then(|archive_id| state.archives.get(archive_id))
            .ok_or_else(|| VaultError::provider("get job output", "job not found"))?;

        let data = archive
            .data
            .clone()
            .ok_or_else(|| VaultError::provider("get job output", "payload not retained"))?;

        let checksum = if state.corrupt_output {
            tree_hash(b"something else")
        } else {
            archive.checksum.clone()
        };

        Ok(JobOutput {
            body: Box::pin(std::io::Cursor::new(data)),
            checksum: Some(checksum),
        })
    }
}

/// Fetcher that writes a tiny fake repository
#[derive(Default)]
pub struct MockFetcher {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, item: &Item, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(item.name.clone());

        if self.failing.lock().unwrap().contains(&item.name) {
            return Err(VaultError::provider("clone", "repository not found"));
        }

        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("HEAD"), format!("ref: refs/heads/{}\n", item.name))?;
        Ok(())
    }
}

/// Packager writing either a small file or a sparse file of a fixed size
#[derive(Default)]
pub struct MockPackager {
    calls: Mutex<Vec<String>>,
    size: Option<u64>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl MockPackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every package is a zero-filled file of `size` bytes
    pub fn sized(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Packaging `name` panics instead of returning an error
    pub fn panic_for(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packager for MockPackager {
    async fn package(&self, source: &Path, dest: &Path) -> Result<u64> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(name.clone());

        if self.failing.lock().unwrap().contains(&name) {
            return Err(VaultError::provider("package", "disk full"));
        }
        let panics = self.panicking.lock().unwrap().contains(&name);
        if panics {
            panic!("packager crashed on {}", name);
        }
        if !source.is_dir() {
            return Err(VaultError::provider("package", "source missing"));
        }

        match self.size {
            Some(size) => {
                let file = std::fs::File::create(dest)?;
                file.set_len(size)?;
            },
            None => std::fs::write(dest, format!("package of {}", name))?,
        }

        Ok(std::fs::metadata(dest)?.len())
    }
}
