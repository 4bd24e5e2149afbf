//! Configuration management
//!
//! Settings come from a TOML file (default `./.ghvault.toml`), then `.env`
//! and `GHVAULT_*` environment variables override individual values.

use crate::layout::RunLayout;
use chrono::format::{Item as FormatItem, StrftimeItems};
use crate::upload::UploadConfig;
use ghvault_common::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file looked up in the working directory when no path is given.
pub const CONFIG_FILE: &str = ".ghvault.toml";

/// Default root for downloads, relative to the working directory.
pub const DEFAULT_ROOT_DIR: &str = "backup";

/// Default directory for audit logs, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default `chrono` format of the run date.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// "-" addresses the account owning the credentials.
pub const DEFAULT_ACCOUNT_ID: &str = "-";

/// Default GitHub REST endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default git executable.
pub const DEFAULT_GIT_BIN: &str = "git";

/// Default interval between retrieval job status checks (5 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// What the loaded configuration is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Archive an organisation: needs GitHub and AWS settings
    Backup,
    /// Retrieve an archive: needs AWS settings only
    Restore,
}

/// Complete tool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub aws: AwsConfig,
    pub paths: PathConfig,
    pub git: GitConfig,
    pub upload: UploadConfig,
    pub retrieval: RetrievalConfig,
}

/// GitHub account and organisation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub username: String,
    /// Personal access token (used as the basic-auth password)
    pub token: String,
    pub org_name: String,
    /// Leave repositories archived upstream out of the run
    pub skip_archived: bool,
    pub api_url: String,
}

/// AWS credentials and Glacier target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub account_id: String,
    /// Vault base name; the run date is appended
    pub vault: String,
    /// Alternate endpoint, e.g. a local emulator
    pub endpoint: Option<String>,
}

/// Local directories and run dating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub root_dir: PathBuf,
    pub log_dir: PathBuf,
    pub date_format: String,
    /// Use this date instead of today, to resume an earlier run
    pub force_date: Option<String>,
}

/// Clone tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub binary: String,
    /// Alternate git executable tried when a clone with `binary` fails
    pub fallback_binary: Option<String>,
}

/// Retrieval job polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub poll_interval_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: String::new(),
            org_name: String::new(),
            skip_archived: false,
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            region: String::new(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            vault: String::new(),
            endpoint: None,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::new(),
            log_dir: PathBuf::new(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            force_date: None,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_GIT_BIN.to_string(),
            fallback_binary: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl RetrievalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// A missing default config file is not an error (everything may come from
    /// the environment); a missing explicitly requested file is.
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = negotiate_config_path(path_override);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                VaultError::config(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            Self::from_toml_str(&raw)?
        } else if path_override.is_some() {
            return Err(VaultError::config(format!(
                "Config file '{}' does not exist",
                path.display()
            )));
        } else {
            Self::default()
        };

        config.apply_env();
        config.expand_paths()?;

        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| VaultError::config(format!("Invalid config file: {}", e)))
    }

    /// Override file values with environment variables
    fn apply_env(&mut self) {
        override_string(&mut self.github.username, &["GHVAULT_GITHUB_USERNAME"]);
        override_string(&mut self.github.token, &["GHVAULT_GITHUB_TOKEN", "GITHUB_TOKEN"]);
        override_string(&mut self.github.org_name, &["GHVAULT_GITHUB_ORG"]);
        override_string(&mut self.github.api_url, &["GHVAULT_GITHUB_API_URL"]);

        override_string(
            &mut self.aws.access_key_id,
            &["GHVAULT_AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"],
        );
        override_string(
            &mut self.aws.secret_access_key,
            &["GHVAULT_AWS_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"],
        );
        override_string(&mut self.aws.region, &["GHVAULT_AWS_REGION", "AWS_REGION"]);
        override_string(&mut self.aws.account_id, &["GHVAULT_AWS_ACCOUNT_ID"]);
        override_string(&mut self.aws.vault, &["GHVAULT_AWS_VAULT"]);

        if let Ok(token) = std::env::var("AWS_SESSION_TOKEN") {
            self.aws.session_token = Some(token);
        }

        if let Ok(dir) = std::env::var("GHVAULT_ROOT_DIR") {
            self.paths.root_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("GHVAULT_LOG_DIR") {
            self.paths.log_dir = PathBuf::from(dir);
        }
    }

    /// Fill directory defaults and resolve `./` and `~` prefixes
    fn expand_paths(&mut self) -> Result<()> {
        let cwd = std::env::current_dir()
            .map_err(|e| VaultError::config(format!("Cannot determine working directory: {}", e)))?;

        self.paths.root_dir = expand_dir(&self.paths.root_dir, DEFAULT_ROOT_DIR, &cwd);
        self.paths.log_dir = expand_dir(&self.paths.log_dir, DEFAULT_LOG_DIR, &cwd);

        Ok(())
    }

    /// Check that every setting required for `purpose` is present
    ///
    /// All problems are reported at once.
    pub fn validate(&self, purpose: Purpose) -> Result<()> {
        let mut missing = Vec::new();

        if purpose == Purpose::Backup {
            if self.github.username.is_empty() {
                missing.push("github.username");
            }
            if self.github.token.is_empty() {
                missing.push("github.token");
            }
            if self.github.org_name.is_empty() {
                missing.push("github.org_name");
            }
        }

        if self.aws.access_key_id.is_empty() {
            missing.push("aws.access_key_id");
        }
        if self.aws.secret_access_key.is_empty() {
            missing.push("aws.secret_access_key");
        }
        if self.aws.region.is_empty() {
            missing.push("aws.region");
        }
        if self.aws.vault.is_empty() {
            missing.push("aws.vault");
        }

        if !missing.is_empty() {
            return Err(VaultError::config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        validate_date_format(&self.paths.date_format)?;

        if self.retrieval.poll_interval_secs == 0 {
            return Err(VaultError::config("retrieval.poll_interval_secs must be greater than 0"));
        }

        self.upload.validate()
    }

    /// Pin the run to a specific date (format per `paths.date_format`)
    pub fn force_date(&mut self, date: impl Into<String>) {
        self.paths.force_date = Some(date.into());
    }

    /// The date string identifying this run
    ///
    /// An unusable `paths.date_format` (rejected by `validate`) falls back to
    /// the default format instead of failing.
    pub fn run_date(&self) -> String {
        if let Some(date) = self.paths.force_date.as_deref().filter(|d| !d.is_empty()) {
            return date.to_string();
        }

        let now = chrono::Local::now();
        let mut date = String::new();
        if write!(date, "{}", now.format(&self.paths.date_format)).is_err() || date.is_empty() {
            date = now.format(DEFAULT_DATE_FORMAT).to_string();
        }
        date
    }

    /// Vault targeted by this run: `<vault>_<date>`
    pub fn vault_name(&self) -> String {
        format!("{}_{}", self.aws.vault, self.run_date())
    }

    /// Directory layout for this run
    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.paths.root_dir, &self.paths.log_dir, self.run_date())
    }
}

/// Reject date formats `chrono` cannot render
fn validate_date_format(format: &str) -> Result<()> {
    if format.is_empty() {
        return Err(VaultError::config("paths.date_format must not be empty"));
    }

    if StrftimeItems::new(format).any(|item| matches!(item, FormatItem::Error)) {
        return Err(VaultError::config(format!(
            "paths.date_format '{}' is not a valid date format",
            format
        )));
    }

    Ok(())
}

/// Build the most appropriate path to the config file
fn negotiate_config_path(path_override: Option<&Path>) -> PathBuf {
    match path_override {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(CONFIG_FILE))
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE)),
    }
}

fn override_string(target: &mut String, vars: &[&str]) {
    if let Some(value) = vars.iter().find_map(|var| std::env::var(var).ok()) {
        *target = value;
    }
}

fn expand_dir(dir: &Path, default: &str, cwd: &Path) -> PathBuf {
    if dir.as_os_str().is_empty() {
        return cwd.join(default);
    }

    if let Ok(rest) = dir.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    if dir.is_relative() {
        return cwd.join(dir.strip_prefix(".").unwrap_or(dir));
    }

    dir.to_path_buf()
}
