//! Repository fetching through the git CLI

use super::Fetcher;
use crate::config::{GitConfig, GithubConfig};
use crate::item::Item;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ghvault_common::{Result, VaultError};
use reqwest::Url;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Bare-clones repositories with the configured credentials
pub struct GitFetcher {
    binary: String,
    fallback_binary: Option<String>,
    username: String,
    token: String,
}

impl GitFetcher {
    pub fn new(git: &GitConfig, github: &GithubConfig) -> Self {
        Self {
            binary: git.binary.clone(),
            fallback_binary: git.fallback_binary.clone(),
            username: github.username.clone(),
            token: github.token.clone(),
        }
    }

    /// Clone passing credentials as an extra HTTP header
    async fn clone_with_header(&self, item: &Item, dest: &Path) -> Result<()> {
        let credentials = STANDARD.encode(format!("{}:{}", self.username, self.token));

        let mut command = Command::new(&self.binary);
        command
            .arg("-c")
            .arg(format!("http.extraHeader=Authorization: Basic {}", credentials))
            .args(["clone", "--bare"])
            .arg(&item.clone_url)
            .arg(dest);

        self.run(command, &self.binary).await
    }

    /// Clone with `binary`, passing credentials in the URL
    async fn clone_with_url_credentials(&self, binary: &str, item: &Item, dest: &Path) -> Result<()> {
        let mut url = Url::parse(&item.clone_url)
            .map_err(|e| VaultError::provider("clone", format!("invalid clone url: {}", e)))?;

        // Only fails for URLs that cannot carry credentials (e.g. file://)
        if url.set_username(&self.username).is_ok() {
            let _ = url.set_password(Some(&self.token));
        }

        let mut command = Command::new(binary);
        command.args(["clone", "--bare", url.as_str()]).arg(dest);

        self.run(command, binary).await
    }

    async fn run(&self, mut command: Command, binary: &str) -> Result<()> {
        command.env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);

        let output = command
            .output()
            .await
            .map_err(|e| VaultError::provider("clone", format!("failed to run {}: {}", binary, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(VaultError::provider(
            "clone",
            format!("{} exited with {}: {}", binary, output.status, self.redact(stderr.trim())),
        ))
    }

    fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.token, "***")
        }
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    #[instrument(skip(self, item), fields(item = %item.name))]
    async fn fetch(&self, item: &Item, dest: &Path) -> Result<()> {
        // GitHub computes `size` lazily; zero does not mean the repository is empty
        debug!(size_kb = item.size_kb, "Cloning");

        let result = match self.clone_with_header(item, dest).await {
            Ok(()) => Ok(()),
            Err(e) => match &self.fallback_binary {
                Some(fallback) => {
                    warn!(error = %e, fallback = %fallback, "Clone failed, retrying with fallback git");
                    remove_partial(dest).await;
                    self.clone_with_url_credentials(fallback, item, dest).await
                },
                None => Err(e),
            },
        };

        if result.is_err() {
            remove_partial(dest).await;
            return result;
        }

        if !dest.is_dir() {
            return Err(VaultError::provider(
                "clone",
                format!("{} was not created", dest.display()),
            ));
        }

        info!("Repository fetched");
        Ok(())
    }
}

async fn remove_partial(dest: &Path) {
    if dest.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(dest).await {
            warn!(path = %dest.display(), error = %e, "Failed to remove partial clone");
        }
    }
}
