//! ghvault CLI - Main entry point

use clap::Parser;
use ghvault_cli::{Cli, Commands};
use ghvault_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {:#}", e);
            log_config
        },
    };

    // The CLI works without logging
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> ghvault_cli::Result<()> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Backup {
            date,
            skip_archived,
        } => ghvault_cli::commands::backup::run(config, date.as_deref(), *skip_archived).await,

        Commands::Restore {
            archive_id,
            output,
            date,
        } => ghvault_cli::commands::restore::run(config, archive_id, output, date.as_deref()).await,
    }
}
