//! Where items come from: listing an organisation and fetching a repository

use crate::item::Item;
use async_trait::async_trait;
use ghvault_common::Result;
use std::path::Path;

pub mod git;
pub mod github;

pub use git::GitFetcher;
pub use github::GitHubLister;

/// Enumerates the items of a run
#[async_trait]
pub trait ItemLister: Send + Sync {
    async fn list_items(&self) -> Result<Vec<Item>>;
}

/// Materialises one item under a local directory
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `item` into `dest`, which must not exist yet
    async fn fetch(&self, item: &Item, dest: &Path) -> Result<()>;
}
