//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod backup;
pub mod restore;

use crate::error::{CliError, Result};
use ghvault_engine::{Config, Purpose};
use std::path::Path;

/// Load, date and validate the configuration for a command
pub(crate) fn load_config(path: Option<&Path>, date: Option<&str>, purpose: Purpose) -> Result<Config> {
    let mut config = Config::load(path).map_err(CliError::settings)?;

    if let Some(date) = date {
        config.force_date(date);
    }

    config.validate(purpose).map_err(CliError::settings)?;
    Ok(config)
}
