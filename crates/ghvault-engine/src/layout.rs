//! On-disk layout of a run
//!
//! ```text
//! <root_dir>/<date>/
//!   progress.json
//!   <name>/         fetched repository (removed once packaged)
//!   <name>.zip      package (removed once uploaded)
//! <log_dir>/<date>.log
//! ```

use std::path::{Path, PathBuf};

/// File name of the persisted progress mapping inside the run directory
pub const PROGRESS_FILE: &str = "progress.json";

/// Package file extension
pub const PACKAGE_EXTENSION: &str = "zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    run_dir: PathBuf,
    log_dir: PathBuf,
    date: String,
}

impl RunLayout {
    pub fn new(root_dir: &Path, log_dir: &Path, date: impl Into<String>) -> Self {
        let date = date.into();
        Self {
            run_dir: root_dir.join(&date),
            log_dir: log_dir.to_path_buf(),
            date,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    /// Where a repository is fetched to
    pub fn fetch_path(&self, name: &str) -> PathBuf {
        self.run_dir.join(name)
    }

    /// Where a repository package is written
    pub fn package_path(&self, name: &str) -> PathBuf {
        self.run_dir.join(format!("{}.{}", name, PACKAGE_EXTENSION))
    }

    pub fn progress_path(&self) -> PathBuf {
        self.run_dir.join(PROGRESS_FILE)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.log", self.date))
    }

    /// Create the run and log directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.run_dir)?;
        std::fs::create_dir_all(&self.log_dir)
    }
}
