// Pseudo Service - Rule driven pseudonymization engine
// Copyright (c) 2025 Pseudo Service Contributors
// Licensed under the MIT License

use pseudo_service::cli::commands::EXIT_FATAL;
use pseudo_service::cli::{Cli, Commands};
use pseudo_service::config::{load_config, LoggingConfig};
use pseudo_service::logging::init_logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    // This is optional - if .env doesn't exist, it's silently ignored
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // File logging follows the configuration when it loads; command errors
    // about the configuration itself are reported by the command
    let file_config = load_config(&cli.config).ok();
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| file_config.as_ref().map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let logging_config = file_config
        .map(|c| c.logging)
        .unwrap_or_else(LoggingConfig::default);

    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Pseudo Service - rule driven pseudonymization"
    );

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e:#}");
            EXIT_FATAL
        }
    };

    // Drop the guard first so buffered file logs are flushed
    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::PseudonymizeField(args) => args.execute(&cli.config).await,
        Commands::DepseudonymizeField(args) => args.execute(&cli.config).await,
        Commands::RepseudonymizeField(args) => args.execute(&cli.config).await,
        Commands::PseudonymizeRecords(args) => args.execute(&cli.config, false).await,
        Commands::DepseudonymizeRecords(args) => args.execute(&cli.config, true).await,
        Commands::GenerateKeyset(args) => args.execute(&cli.config).await,
        Commands::LookupSid(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
