//! Persistent per-item progress
//!
//! The whole mapping is rewritten after every mutation so an interrupted run
//! resumes from the last completed stage of every item.

use ghvault_common::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Completed stages of one item
///
/// Callers keep `uploaded => packaged => fetched`; loading does not enforce it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, alias = "Downloaded")]
    pub fetched: bool,

    #[serde(default, rename = "archived", alias = "Archived")]
    pub packaged: bool,

    #[serde(default, alias = "Uploaded")]
    pub uploaded: bool,
}

impl ProgressRecord {
    pub fn has(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetched => self.fetched,
            Stage::Packaged => self.packaged,
            Stage::Uploaded => self.uploaded,
        }
    }

    fn set(&mut self, stage: Stage) {
        match stage {
            Stage::Fetched => self.fetched = true,
            Stage::Packaged => self.packaged = true,
            Stage::Uploaded => self.uploaded = true,
        }
    }
}

/// A stage transition an item can complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetched,
    Packaged,
    Uploaded,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetched => write!(f, "fetched"),
            Stage::Packaged => write!(f, "packaged"),
            Stage::Uploaded => write!(f, "uploaded"),
        }
    }
}

/// Progress mapping backed by `<run_dir>/progress.json`
pub struct ProgressStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, ProgressRecord>>,
}

impl ProgressStore {
    /// Load the mapping stored at `path` (normally `RunLayout::progress_path`)
    ///
    /// A missing file starts an empty mapping. So does a corrupt one, after a
    /// warning; it is overwritten by the next update.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let records = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable progress file");
                    BTreeMap::new()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read progress file");
                BTreeMap::new()
            },
        };

        debug!(path = %path.display(), items = records.len(), "Loaded progress");

        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Record of `name`, all false when unknown
    pub fn get(&self, name: &str) -> ProgressRecord {
        self.lock().get(name).copied().unwrap_or_default()
    }

    /// Replace the record of `name` and persist the mapping
    pub fn update(&self, name: &str, record: ProgressRecord) {
        let mut records = self.lock();
        records.insert(name.to_string(), record);
        self.persist_logged(&records);
    }

    /// Mark `stage` complete for `name` and persist the mapping
    pub fn advance(&self, name: &str, stage: Stage) -> ProgressRecord {
        let mut records = self.lock();
        let record = records.entry(name.to_string()).or_default();
        record.set(stage);
        let updated = *record;
        self.persist_logged(&records);
        updated
    }

    /// Number of known items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ProgressRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist_logged(&self, records: &BTreeMap<String, ProgressRecord>) {
        if let Err(e) = self.persist(records) {
            warn!(error = %e, "Progress kept in memory only");
        }
    }

    fn persist(&self, records: &BTreeMap<String, ProgressRecord>) -> Result<()> {
        let persistence = |message: String| VaultError::Persistence {
            path: self.path.display().to_string(),
            message,
        };

        let json = serde_json::to_vec_pretty(records).map_err(|e| persistence(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| persistence(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| persistence(e.to_string()))
    }
}
