//! Repository items flowing through the pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One repository of the organisation
///
/// Deserializes directly from a GitHub `GET /orgs/{org}/repos` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,

    /// Archived (read-only) upstream
    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub clone_url: String,

    /// Size reported by GitHub in KiB; computed lazily, so zero is common
    #[serde(default, rename = "size")]
    pub size_kb: u64,
}

impl Item {
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            archived: false,
            clone_url: clone_url.into(),
            size_kb: 0,
        }
    }
}

/// Archive description of an item: `"<date> - <name>"`
pub fn archive_description(date: &str, name: &str) -> String {
    format!("{} - {}", date, name)
}

/// What travels on the stage queues
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub item: Arc<Item>,
    /// `"<date> - <name>"`, used in the audit log and as the archive description
    pub description: String,
    /// Size of the package, once this run has produced it
    pub packaged_size: Option<u64>,
}

impl QueueEntry {
    pub fn new(item: Arc<Item>, description: impl Into<String>) -> Self {
        Self {
            item,
            description: description.into(),
            packaged_size: None,
        }
    }

    pub fn with_packaged_size(mut self, size: u64) -> Self {
        self.packaged_size = Some(size);
        self
    }

    pub fn name(&self) -> &str {
        &self.item.name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_github_repo() {
        let json = r#"{
            "id": 1296269,
            "name": "svc-a",
            "full_name": "acme/svc-a",
            "archived": true,
            "clone_url": "https://github.com/acme/svc-a.git",
            "size": 108
        }"#;

        let item: Item = serde_json::from_str(json).unwrap();

        assert_eq!(item.name, "svc-a");
        assert!(item.archived);
        assert_eq!(item.clone_url, "https://github.com/acme/svc-a.git");
        assert_eq!(item.size_kb, 108);
    }

    #[test]
    fn test_missing_fields_default() {
        let item: Item = serde_json::from_str(r#"{"name": "blank"}"#).unwrap();
        assert_eq!(item.size_kb, 0);
        assert!(!item.archived);
        assert!(item.clone_url.is_empty());
    }
}
