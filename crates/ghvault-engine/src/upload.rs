//! Chunked upload protocol
//!
//! Payloads up to the threshold go out in one request. Larger payloads use a
//! multipart session: fixed-size parts sent strictly in order, each with its
//! own tree hash, then a finalize call carrying the total size and the tree
//! hash of the whole payload. A session that cannot be completed is aborted
//! exactly once before the error is returned.

use crate::storage::{ByteRange, ColdStorage};
use ghvault_common::checksum::{tree_hash, TreeHasher, TREE_HASH_CHUNK_SIZE};
use ghvault_common::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

const MIB: u64 = TREE_HASH_CHUNK_SIZE as u64;

/// Default multipart part size (128 MiB)
pub const DEFAULT_PART_SIZE: u64 = 128 * MIB;

/// Default largest payload sent in a single request (128 MiB)
pub const DEFAULT_SINGLE_SHOT_THRESHOLD: u64 = 128 * MIB;

/// Largest part size (and single request) Glacier accepts
pub const MAX_PART_SIZE: u64 = 4096 * MIB;

/// Upload tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Multipart part size: 1 MiB times a power of two, at most 4 GiB
    pub part_size: u64,
    /// Payloads of at most this many bytes are uploaded in one request
    pub single_shot_threshold: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            single_shot_threshold: DEFAULT_SINGLE_SHOT_THRESHOLD,
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_part = self.part_size >= MIB
            && self.part_size <= MAX_PART_SIZE
            && self.part_size % MIB == 0
            && (self.part_size / MIB).is_power_of_two();

        if !valid_part {
            return Err(VaultError::config(format!(
                "upload.part_size must be 1 MiB times a power of two, at most 4 GiB (got {})",
                self.part_size
            )));
        }

        if self.single_shot_threshold > MAX_PART_SIZE {
            return Err(VaultError::config(format!(
                "upload.single_shot_threshold must be at most 4 GiB (got {})",
                self.single_shot_threshold
            )));
        }

        Ok(())
    }
}

/// Byte ranges of the parts of a `total_size` payload
///
/// Contiguous, starting at 0, each `part_size` long except a shorter last one.
pub fn part_ranges(total_size: u64, part_size: u64) -> Vec<ByteRange> {
    if part_size == 0 {
        return Vec::new();
    }

    let mut ranges = Vec::with_capacity(total_size.div_ceil(part_size) as usize);
    let mut start = 0;

    while start < total_size {
        let end = (start + part_size).min(total_size);
        ranges.push(ByteRange::new(start, end));
        start = end;
    }

    ranges
}

/// State of one multipart session
#[derive(Clone)]
pub struct UploadHandle {
    pub upload_id: String,
    /// Bytes sent so far
    pub offset: u64,
    tree: TreeHasher,
}

impl UploadHandle {
    fn new(upload_id: String) -> Self {
        Self {
            upload_id,
            offset: 0,
            tree: TreeHasher::new(),
        }
    }
}

/// Uploads payloads to cold storage
pub struct ChunkedUploader {
    storage: Arc<dyn ColdStorage>,
    config: UploadConfig,
}

impl ChunkedUploader {
    pub fn new(storage: Arc<dyn ColdStorage>, config: UploadConfig) -> Self {
        Self { storage, config }
    }

    /// Upload `total_size` bytes from `reader`; returns the archive id
    ///
    /// Never reads past `total_size`.
    pub async fn upload<R>(&self, reader: &mut R, total_size: u64, description: &str) -> Result<String>
    where
        R: AsyncRead + Unpin + Send,
    {
        if total_size <= self.config.single_shot_threshold {
            self.upload_single(reader, total_size, description).await
        } else {
            self.upload_multipart(reader, total_size, description).await
        }
    }

    async fn upload_single<R>(&self, reader: &mut R, total_size: u64, description: &str) -> Result<String>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut body = Vec::with_capacity(total_size as usize);
        (&mut *reader).take(total_size).read_to_end(&mut body).await?;

        if body.len() as u64 != total_size {
            return Err(VaultError::integrity(format!(
                "expected {} bytes, read {}",
                total_size,
                body.len()
            )));
        }

        let checksum = tree_hash(&body);
        debug!(size = total_size, "Uploading in a single request");

        self.storage.upload_archive(body, description, &checksum).await
    }

    async fn upload_multipart<R>(&self, reader: &mut R, total_size: u64, description: &str) -> Result<String>
    where
        R: AsyncRead + Unpin + Send,
    {
        let part_size = self.config.part_size;
        let upload_id = self
            .storage
            .initiate_multipart_upload(description, part_size)
            .await?;

        info!(
            upload_id = %upload_id,
            size = total_size,
            parts = total_size.div_ceil(part_size),
            "Multipart upload started"
        );

        let mut handle = UploadHandle::new(upload_id);

        if let Err(e) = self.send_parts(reader, total_size, &mut handle).await {
            self.abort(&handle).await;
            return Err(e);
        }

        if handle.offset != total_size {
            self.abort(&handle).await;
            return Err(VaultError::integrity(format!(
                "sent {} bytes of a {} byte payload",
                handle.offset, total_size
            )));
        }

        let checksum = handle.tree.clone().finalize_hex();

        match self
            .storage
            .complete_multipart_upload(&handle.upload_id, total_size, &checksum)
            .await
        {
            Ok(archive_id) => {
                info!(upload_id = %handle.upload_id, archive_id = %archive_id, "Multipart upload completed");
                Ok(archive_id)
            },
            Err(e) => {
                self.abort(&handle).await;
                Err(e)
            },
        }
    }

    async fn send_parts<R>(&self, reader: &mut R, total_size: u64, handle: &mut UploadHandle) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        for range in part_ranges(total_size, self.config.part_size) {
            let mut body = vec![0u8; range.len() as usize];
            reader.read_exact(&mut body).await?;

            let checksum = tree_hash(&body);
            handle.tree.update(&body);

            self.storage
                .upload_part(&handle.upload_id, range, body, &checksum)
                .await?;

            handle.offset = range.end;
            debug!(upload_id = %handle.upload_id, range = %range.content_range(), "Part uploaded");
        }

        Ok(())
    }

    async fn abort(&self, handle: &UploadHandle) {
        warn!(upload_id = %handle.upload_id, offset = handle.offset, "Aborting multipart upload");

        if let Err(e) = self.storage.abort_multipart_upload(&handle.upload_id).await {
            warn!(upload_id = %handle.upload_id, error = %e, "Failed to abort multipart upload");
        }
    }
}
