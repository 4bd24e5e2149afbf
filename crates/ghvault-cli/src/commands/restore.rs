//! `ghvault restore`

use super::load_config;
use crate::error::{CliError, Result};
use crate::progress::{create_spinner, format_bytes};
use colored::Colorize;
use ghvault_engine::{GlacierStorage, Purpose, Retriever};
use std::path::Path;
use std::sync::Arc;

pub async fn run(
    config_path: Option<&Path>,
    archive_id: &str,
    output: &Path,
    date: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path, date, Purpose::Restore)?;

    if output.is_dir() {
        return Err(CliError::config(format!(
            "output '{}' is a directory",
            output.display()
        )));
    }

    let storage = Arc::new(GlacierStorage::new(&config.aws, config.vault_name()).await);
    let interval = config.retrieval.poll_interval();

    let spinner = create_spinner(&format!(
        "Retrieving {} from {} (checking every {}s, this usually takes hours)",
        archive_id,
        storage.vault(),
        interval.as_secs()
    ));
    let retriever = Retriever::new(storage, interval);
    let result = retriever.restore(archive_id, output).await;
    spinner.finish_and_clear();

    let report = result.map_err(CliError::aws)?;

    let verified = if report.verified {
        "checksum verified".green()
    } else {
        "no checksum reported".yellow()
    };

    println!(
        "Restored {} to {} ({}, {})",
        archive_id,
        output.display(),
        format_bytes(report.bytes),
        verified
    );

    Ok(())
}
