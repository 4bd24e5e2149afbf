//! GitHub organisation repository listing

use super::ItemLister;
use crate::config::GithubConfig;
use crate::item::Item;
use async_trait::async_trait;
use ghvault_common::{Result, VaultError};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument};

// ============================================================================
// GitHub API Constants
// ============================================================================

/// Repositories requested per page (the API maximum)
pub const PER_PAGE: usize = 100;

/// Timeout of one listing request
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("ghvault/", env!("CARGO_PKG_VERSION"));

/// Lists every repository of an organisation
pub struct GitHubLister {
    client: Client,
    api_url: String,
    org: String,
    username: String,
    token: String,
}

impl GitHubLister {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VaultError::provider("build http client", e))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            org: config.org_name.clone(),
            username: config.username.clone(),
            token: config.token.clone(),
        })
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<Item>> {
        let url = format!("{}/orgs/{}/repos", self.api_url, self.org);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.token))
            .header("Accept", "application/vnd.github+json")
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .send()
            .await
            .map_err(|e| VaultError::provider("list repositories", e))?
            .error_for_status()
            .map_err(|e| VaultError::provider("list repositories", e))?;

        response
            .json()
            .await
            .map_err(|e| VaultError::provider("list repositories", e))
    }
}

#[async_trait]
impl ItemLister for GitHubLister {
    #[instrument(skip(self), fields(org = %self.org))]
    async fn list_items(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            let count = batch.len();
            debug!(page, count, "Fetched repository page");

            items.extend(batch);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        info!(repositories = items.len(), "Listed organisation repositories");
        Ok(items)
    }
}
