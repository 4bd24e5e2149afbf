//! `ghvault backup`

use super::load_config;
use crate::error::{CliError, Result};
use crate::progress::{create_spinner, render_summary};
use colored::Colorize;
use ghvault_engine::{
    ChunkedUploader, ColdStorage, FileAuditLogger, GitFetcher, GitHubLister, GlacierStorage,
    ItemLister, Pipeline, ProgressStore, Purpose, ZipPackager,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(config_path: Option<&Path>, date: Option<&str>, skip_archived: bool) -> Result<()> {
    let mut config = load_config(config_path, date, Purpose::Backup)?;
    if skip_archived {
        config.github.skip_archived = true;
    }

    let layout = config.layout();
    layout.ensure_dirs()?;

    info!(
        org = %config.github.org_name,
        vault = %config.vault_name(),
        run_dir = %layout.run_dir().display(),
        "Starting backup"
    );

    let lister = GitHubLister::new(&config.github).map_err(CliError::github)?;

    let spinner = create_spinner(&format!("Listing repositories of {}", config.github.org_name));
    let listed = lister.list_items().await;
    spinner.finish_and_clear();
    let items = listed.map_err(CliError::github)?;

    let storage = Arc::new(GlacierStorage::new(&config.aws, config.vault_name()).await);
    storage.create_vault().await.map_err(CliError::aws)?;

    println!(
        "Archiving {} repositories to vault {}",
        items.len(),
        storage.vault().bold()
    );

    let progress = Arc::new(ProgressStore::load(layout.progress_path()));
    let audit = Arc::new(FileAuditLogger::new(layout.audit_log_path()));

    let pipeline = Pipeline::new(
        layout.clone(),
        Arc::clone(&progress),
        audit.clone(),
        Arc::new(GitFetcher::new(&config.git, &config.github)),
        Arc::new(ZipPackager::new()),
        Arc::new(ChunkedUploader::new(storage, config.upload.clone())),
    )
    .skip_archived(config.github.skip_archived);

    let summary = pipeline.run(items).await;

    for line in render_summary(&summary) {
        println!("  {}", line);
    }
    println!("Progress: {}", progress.path().display());
    println!("Audit log: {}", audit.path().display());

    Ok(())
}
