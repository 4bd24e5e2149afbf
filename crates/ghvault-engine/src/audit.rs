//! Append-only audit log of archive transitions
//!
//! One CSV-like line per completed or failed transition:
//! `archive_id,description,error`.

use ghvault_common::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Header written when the log file is created
pub const AUDIT_HEADER: &str = "Archive Id,Description,Error";

/// One audit line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub archive_id: String,
    pub description: String,
    pub error: String,
}

impl AuditEntry {
    pub fn success(archive_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            archive_id: archive_id.into(),
            description: description.into(),
            error: String::new(),
        }
    }

    pub fn failure(description: impl Into<String>, error: impl ToString) -> Self {
        Self {
            archive_id: String::new(),
            description: description.into(),
            error: error.to_string(),
        }
    }

    /// Render as one line; separators inside fields are neutralised
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            sanitize(&self.archive_id),
            sanitize(&self.description),
            sanitize(&self.error)
        )
    }
}

fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| match c {
            ',' => ';',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Trait for audit logging (dependency injection)
pub trait AuditLogger: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Audit log in `<log_dir>/<date>.log`, opened on first write
pub struct FileAuditLogger {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileAuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if is_new {
            writeln!(file, "{}", AUDIT_HEADER)?;
        }

        Ok(file)
    }
}

impl AuditLogger for FileAuditLogger {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);

        let file = match guard.take() {
            Some(file) => file,
            None => self.open()?,
        };
        let file = guard.insert(file);

        writeln!(file, "{}", entry.to_line())?;
        file.flush()?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("2021-04-01.log");

        let logger = FileAuditLogger::new(&path);
        logger
            .record(&AuditEntry::success("arch-1", "2021-04-01 - svc-a"))
            .unwrap();
        logger
            .record(&AuditEntry::failure("2021-04-01 - svc-b", "clone failed"))
            .unwrap();

        // A second logger on the same day appends without a new header
        FileAuditLogger::new(&path)
            .record(&AuditEntry::success("arch-3", "2021-04-01 - svc-c"))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(
            lines,
            vec![
                AUDIT_HEADER,
                "arch-1,2021-04-01 - svc-a,",
                ",2021-04-01 - svc-b,clone failed",
                "arch-3,2021-04-01 - svc-c,",
            ]
        );
    }

    #[test]
    fn test_separators_neutralised() {
        let entry = AuditEntry::failure("d", "bad, very bad\nreally");
        assert_eq!(entry.to_line(), ",d,bad; very bad really");
    }
}
